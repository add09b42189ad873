//! Per-resource model: tables, reference/descriptor bindings, and key
//! unification records.

use serde::Serialize;

use crate::model::names::{DbColumnName, DbSchemaName, DbTableName, QualifiedResourceName};
use crate::model::table::DbTableModel;
use crate::path::JsonPathExpression;
use crate::schema::effective::ResourceKeyEntry;

/// How a resource's documents are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceStorageKind {
    /// Dedicated root table plus collection/extension tables.
    RelationalTables,
    /// Rows in the shared `dms.Descriptor` table.
    SharedDescriptorTable,
}

/// One identity component projected from a document reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceIdentityBinding {
    /// The reference-side document path carrying the value.
    pub source_json_path: JsonPathExpression,
    pub column: DbColumnName,
}

/// A bound document reference: its FK column plus projected identity columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReferenceBinding {
    pub reference_object_path: JsonPathExpression,
    pub table: DbTableName,
    pub fk_column: DbColumnName,
    pub target_resource: QualifiedResourceName,
    pub is_identity_component: bool,
    pub is_required: bool,
    pub identity_bindings: Vec<ReferenceIdentityBinding>,
}

/// A bound descriptor edge: where a descriptor value path became an FK column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorEdgeSource {
    pub descriptor_value_path: JsonPathExpression,
    pub table: DbTableName,
    pub fk_column: DbColumnName,
    pub descriptor_resource: QualifiedResourceName,
    pub is_identity_component: bool,
    pub is_required: bool,
}

/// A key-unification class: one canonical stored column plus its alias
/// members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyUnificationClass {
    pub table: DbTableName,
    pub canonical_column: DbColumnName,
    /// All member columns of the class (canonical included), ordered by
    /// source path then name.
    pub member_columns: Vec<DbColumnName>,
}

/// One endpoint of a declared equality constraint, as resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqualityConstraintEndpoint {
    pub path: JsonPathExpression,
    pub column: DbColumnName,
}

/// Why an equality constraint was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EqualityConstraintIgnoredReason {
    /// Endpoints resolved to columns in different tables.
    CrossTable,
}

/// The disposition of one declared equality constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeyUnificationEqualityConstraint {
    Applied {
        endpoint_a: EqualityConstraintEndpoint,
        endpoint_b: EqualityConstraintEndpoint,
        canonical_column: DbColumnName,
    },
    /// Both endpoints already resolved to the same column.
    Redundant {
        endpoint_a: EqualityConstraintEndpoint,
        endpoint_b: EqualityConstraintEndpoint,
    },
    Ignored {
        endpoint_a: EqualityConstraintEndpoint,
        endpoint_b: EqualityConstraintEndpoint,
        reason: EqualityConstraintIgnoredReason,
    },
}

/// The complete relational model for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationalResourceModel {
    pub resource: QualifiedResourceName,
    pub physical_schema: DbSchemaName,
    pub storage_kind: ResourceStorageKind,
    /// Tables in dependency order (root first, then collection and extension
    /// tables by scope).
    pub tables: Vec<DbTableModel>,
    pub document_reference_bindings: Vec<DocumentReferenceBinding>,
    pub descriptor_edge_sources: Vec<DescriptorEdgeSource>,
    pub key_unification_classes: Vec<KeyUnificationClass>,
    pub key_unification_equality_constraints: Vec<KeyUnificationEqualityConstraint>,
    /// Whether identity value updates must propagate to referencing rows.
    pub allow_identity_updates: bool,
}

impl RelationalResourceModel {
    /// The root table (document scope `$`).
    pub fn root_table(&self) -> &DbTableModel {
        // Invariant upheld by construction: the first table is the root.
        &self.tables[0]
    }

    pub fn root_table_mut(&mut self) -> &mut DbTableModel {
        &mut self.tables[0]
    }

    pub fn table_by_name(&self, name: &DbTableName) -> Option<&DbTableModel> {
        self.tables.iter().find(|table| &table.table == name)
    }

    pub fn table_by_name_mut(&mut self, name: &DbTableName) -> Option<&mut DbTableModel> {
        self.tables.iter_mut().find(|table| &table.table == name)
    }

    pub fn table_by_scope(&self, scope: &JsonPathExpression) -> Option<&DbTableModel> {
        self.tables.iter().find(|table| &table.json_scope == scope)
    }
}

/// A concrete resource model together with its resource-key entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcreteResourceModel {
    pub resource_key: ResourceKeyEntry,
    pub model: RelationalResourceModel,
}
