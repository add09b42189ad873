//! Step 4: derive table scopes and keys.
//!
//! The insert schema is walked top-down: the tree root owns one table, every
//! array of objects (or descriptor scalar array) under it becomes a collection
//! table keyed by the propagated root document id, the ordinals of enclosing
//! collections, and its own `Ordinal`. The same walk serves resource roots and
//! extension subtrees; only the root table identity and key differ.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::derive::resource::{classify, SchemaNode};
use crate::error::DerivationError;
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::{DbColumnName, DbTableName, QualifiedResourceName};
use crate::model::table::{
    DbKeyColumn, DbTableModel, ReferentialAction, TableConstraint, TableKey,
};
use crate::naming;
use crate::path::JsonPathExpression;

/// Parameters for one table-tree derivation.
pub struct TableTreeParams<'a> {
    pub resource: &'a QualifiedResourceName,
    /// Object schema at the root of the tree.
    pub schema: &'a Value,
    pub root_scope: JsonPathExpression,
    pub root_table: DbTableName,
    /// Base token used to prefix collection table names.
    pub root_table_base: String,
    /// Base token for the propagated root document id column name.
    pub document_id_base: String,
    pub root_key: TableKey,
    /// Constraints already owned by the tree root (e.g. the FK from an
    /// extension table to its base table).
    pub root_constraints: Vec<TableConstraint>,
    /// Canonical paths of subtrees that are not flattened here (reference
    /// objects).
    pub skip_paths: &'a BTreeSet<String>,
    /// Collection base of the array scope the tree root sits in, if any;
    /// inherited ordinal key parts rename through it.
    pub root_collection_base: Option<String>,
}

/// Derives the table tree for one schema subtree. The root table is first;
/// collection tables follow in discovery (scope) order.
pub fn derive_table_tree(params: &TableTreeParams<'_>) -> Result<Vec<DbTableModel>, DerivationError> {
    check_key_column_uniqueness(params.resource, &params.root_table, &params.root_key)?;
    let root_columns = key_part_columns(&params.root_key);
    let mut tables = vec![DbTableModel {
        table: params.root_table.clone(),
        json_scope: params.root_scope.clone(),
        key: params.root_key.clone(),
        columns: root_columns,
        constraints: params.root_constraints.clone(),
    }];

    let root = Frame {
        table_index: 0,
        table_base: params.root_table_base.clone(),
        own_collection_base: params.root_collection_base.clone(),
    };
    walk_object(params, params.schema, &params.root_scope, &root, &mut tables)?;

    check_table_name_collisions(params.resource, &tables)?;

    Ok(tables)
}

struct Frame {
    table_index: usize,
    table_base: String,
    /// The collection base of this table's own array property, used to
    /// rename its `Ordinal` in descendant keys.
    own_collection_base: Option<String>,
}

fn walk_object(
    params: &TableTreeParams<'_>,
    value: &Value,
    path: &JsonPathExpression,
    frame: &Frame,
    tables: &mut Vec<DbTableModel>,
) -> Result<(), DerivationError> {
    let schema = match classify(value, path)? {
        SchemaNode::Object(schema) => schema,
        _ => {
            return Err(DerivationError::schema_shape(format!(
                "expected an object schema at {} on resource {}",
                path.canonical(),
                params.resource
            )));
        }
    };

    let properties = super::properties(schema, path)?;
    for (name, property_schema) in properties {
        if name == "_ext" {
            continue;
        }
        let property_path = path.child_property(name);
        if params.skip_paths.contains(property_path.canonical()) {
            continue;
        }
        match classify(property_schema, &property_path)? {
            SchemaNode::Object(_) => {
                // Inline object: columns stay on the current table.
                walk_object(params, property_schema, &property_path, frame, tables)?;
            }
            SchemaNode::Array(array_schema) => {
                derive_collection_table(
                    params,
                    array_schema,
                    name,
                    &property_path,
                    frame,
                    tables,
                )?;
            }
            SchemaNode::Scalar(_) => {}
        }
    }

    Ok(())
}

fn derive_collection_table(
    params: &TableTreeParams<'_>,
    array_schema: &serde_json::Map<String, Value>,
    property_name: &str,
    property_path: &JsonPathExpression,
    parent: &Frame,
    tables: &mut Vec<DbTableModel>,
) -> Result<(), DerivationError> {
    let collection_base = naming::collection_base_name(property_name);

    let table_base = format!("{}{collection_base}", parent.table_base);
    let table = params.root_table.renamed(&table_base);
    let element_scope = property_path.child_array_element();

    let parent_table = &tables[parent.table_index];
    let parent_key = parent_table.key.clone();
    let parent_table_name = parent_table.table.clone();

    // Propagate the parent key, renaming the parent's own parts.
    let mut key_columns = Vec::new();
    let mut fk_local = Vec::new();
    for part in &parent_key.columns {
        let renamed = if part.name.as_str() == naming::DOCUMENT_ID {
            naming::root_document_id_column(&params.document_id_base)
        } else if part.name.as_str() == naming::ORDINAL {
            let parent_collection_base = parent.own_collection_base.as_deref().unwrap_or_default();
            naming::parent_ordinal_column(parent_collection_base)
        } else {
            part.name.clone()
        };
        fk_local.push(renamed.clone());
        key_columns.push(DbKeyColumn {
            name: renamed,
            kind: ColumnKind::ParentKeyPart,
        });
    }
    key_columns.push(DbKeyColumn {
        name: DbColumnName::new(naming::ORDINAL),
        kind: ColumnKind::Ordinal,
    });

    let key = TableKey {
        name: naming::primary_key_name(&table),
        columns: key_columns,
    };
    check_key_column_uniqueness(params.resource, &table, &key)?;

    let parent_fk = TableConstraint::ForeignKey {
        name: naming::foreign_key_name(&table, &[parent_table_name.name().to_string()]),
        columns: fk_local,
        target_table: parent_table_name,
        target_columns: parent_key.column_names(),
        on_delete: ReferentialAction::Cascade,
        on_update: ReferentialAction::NoAction,
    };

    let columns = key_part_columns(&key);
    tables.push(DbTableModel {
        table,
        json_scope: element_scope.clone(),
        key,
        columns,
        constraints: vec![parent_fk],
    });

    let frame = Frame {
        table_index: tables.len() - 1,
        table_base,
        own_collection_base: Some(collection_base),
    };

    let items = super::array_items(array_schema, property_path)?;
    if let SchemaNode::Object(_) = classify(items, &element_scope)? {
        walk_object(params, items, &element_scope, &frame, tables)?;
    }
    // Scalar elements contribute their column in the column derivation step.

    Ok(())
}

/// Materializes key parts as physical columns.
fn key_part_columns(key: &TableKey) -> Vec<DbColumnModel> {
    key.columns
        .iter()
        .map(|part| {
            let scalar_type = if naming::is_document_id_column(&part.name) {
                RelationalScalarType::Int64
            } else {
                RelationalScalarType::Int32
            };
            DbColumnModel {
                name: part.name.clone(),
                kind: part.kind,
                scalar_type: Some(scalar_type),
                is_nullable: false,
                source_json_path: None,
                target_resource: None,
                storage: ColumnStorage::Stored,
            }
        })
        .collect()
}

fn check_key_column_uniqueness(
    resource: &QualifiedResourceName,
    table: &DbTableName,
    key: &TableKey,
) -> Result<(), DerivationError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for part in &key.columns {
        if !seen.insert(part.name.as_str()) {
            return Err(DerivationError::mapping(format!(
                "key column '{}' on table '{}' of resource {resource} is derived more than once",
                part.name, table
            )));
        }
    }
    Ok(())
}

fn check_table_name_collisions(
    resource: &QualifiedResourceName,
    tables: &[DbTableModel],
) -> Result<(), DerivationError> {
    let mut by_name: BTreeMap<&str, &DbTableModel> = BTreeMap::new();
    for table in tables {
        if let Some(existing) = by_name.insert(table.table.name(), table) {
            return Err(DerivationError::mapping(format!(
                "table name '{}' on resource {resource} is derived for both scope '{}' and scope '{}'; use relational.nameOverrides to disambiguate",
                table.table.name(),
                existing.json_scope.canonical(),
                table.json_scope.canonical()
            )));
        }
    }
    Ok(())
}
