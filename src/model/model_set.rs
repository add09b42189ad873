//! The final derivation output.

use serde::Serialize;

use crate::dialect::SqlDialect;
use crate::model::abstracts::{AbstractIdentityTableInfo, AbstractUnionViewInfo};
use crate::model::inventory::{DbIndexInfo, DbTriggerInfo};
use crate::model::names::DbSchemaName;
use crate::model::resource::ConcreteResourceModel;
use crate::schema::effective::EffectiveSchemaInfo;

/// One project's physical placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSchemaInfo {
    pub endpoint_name: String,
    pub project_name: String,
    pub project_version: String,
    pub is_extension: bool,
    pub physical_schema: DbSchemaName,
}

/// The fully-derived relational model for an effective schema set.
///
/// All collections are canonically ordered, so two structurally-equal inputs
/// produce byte-for-byte equal serialized model sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedRelationalModelSet {
    pub effective_schema: EffectiveSchemaInfo,
    pub dialect: SqlDialect,
    pub project_schemas_in_endpoint_order: Vec<ProjectSchemaInfo>,
    /// Concrete resource models ordered by `(project name, resource name)`.
    pub resources_in_name_order: Vec<ConcreteResourceModel>,
    pub abstract_identity_tables_in_name_order: Vec<AbstractIdentityTableInfo>,
    pub abstract_union_views_in_name_order: Vec<AbstractUnionViewInfo>,
    /// Index inventory ordered by `(schema, table, name)`.
    pub indexes_in_create_order: Vec<DbIndexInfo>,
    /// Trigger inventory ordered by `(schema, table, name)`.
    pub triggers_in_create_order: Vec<DbTriggerInfo>,
}
