//! Step 5: derive scalar columns and bind descriptor edges.
//!
//! Walks each table scope's subtree, inlining nested objects into dotted
//! PascalCase column names, resolving scalar types from the schema node plus
//! the decimal/string-length validation metadata, and turning descriptor
//! value paths into descriptor FK columns with recorded edges.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::derive::resource::extract::{DecimalInfo, ResourceInputs};
use crate::derive::resource::{classify, SchemaNode};
use crate::error::DerivationError;
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::{DbColumnName, DbSchemaName, DbTableName, QualifiedResourceName};
use crate::model::resource::DescriptorEdgeSource;
use crate::model::table::{DbTableModel, ReferentialAction, TableConstraint};
use crate::naming;
use crate::path::{JsonPathExpression, JsonPathSegment};

/// Descriptor mapping metadata for one descriptor value path.
#[derive(Debug, Clone)]
pub struct DescriptorPathInfo {
    pub target: QualifiedResourceName,
    pub is_part_of_identity: bool,
    pub is_required: bool,
}

/// Parameters for one column-derivation walk over a table tree.
pub struct ColumnDeriveParams<'a> {
    pub inputs: &'a ResourceInputs,
    /// Object schema at the root of the tree (matches the first table's
    /// scope).
    pub schema: &'a Value,
    pub root_scope: JsonPathExpression,
    /// Canonical descriptor value path to its mapping metadata.
    pub descriptor_paths: &'a BTreeMap<String, DescriptorPathInfo>,
    /// Canonical paths of subtrees not flattened here (reference objects).
    pub skip_paths: &'a BTreeSet<String>,
    /// Canonical identity paths, which must stay non-nullable.
    pub identity_paths: &'a BTreeSet<String>,
}

/// Derives columns for every table in the tree, returning the descriptor
/// edges bound along the way.
pub fn derive_columns(
    params: &ColumnDeriveParams<'_>,
    tables: &mut Vec<DbTableModel>,
) -> Result<Vec<DescriptorEdgeSource>, DerivationError> {
    let root_index = table_index_by_scope(tables, &params.root_scope).ok_or_else(|| {
        DerivationError::mapping(format!(
            "no table scope found at {} on resource {}",
            params.root_scope.canonical(),
            params.inputs.resource
        ))
    })?;

    let mut edges = Vec::new();
    walk_object(
        params,
        params.schema,
        &params.root_scope.clone(),
        root_index,
        &params.root_scope.clone(),
        true,
        tables,
        &mut edges,
    )?;
    Ok(edges)
}

fn table_index_by_scope(
    tables: &[DbTableModel],
    scope: &JsonPathExpression,
) -> Option<usize> {
    tables.iter().position(|table| &table.json_scope == scope)
}

#[allow(clippy::too_many_arguments)]
fn walk_object(
    params: &ColumnDeriveParams<'_>,
    value: &Value,
    path: &JsonPathExpression,
    table_index: usize,
    table_scope: &JsonPathExpression,
    required_chain: bool,
    tables: &mut Vec<DbTableModel>,
    edges: &mut Vec<DescriptorEdgeSource>,
) -> Result<(), DerivationError> {
    let schema = match classify(value, path)? {
        SchemaNode::Object(schema) => schema,
        _ => {
            return Err(DerivationError::schema_shape(format!(
                "expected an object schema at {} on resource {}",
                path.canonical(),
                params.inputs.resource
            )));
        }
    };

    let required = super::required_set(schema, path)?;
    let properties = super::properties(schema, path)?;

    for (name, property_schema) in properties {
        if name == "_ext" {
            continue;
        }
        let property_path = path.child_property(name);
        if params.skip_paths.contains(property_path.canonical()) {
            continue;
        }
        let property_required = required_chain && required.contains(name);

        match classify(property_schema, &property_path)? {
            SchemaNode::Object(_) => {
                walk_object(
                    params,
                    property_schema,
                    &property_path,
                    table_index,
                    table_scope,
                    property_required,
                    tables,
                    edges,
                )?;
            }
            SchemaNode::Array(array_schema) => {
                let element_scope = property_path.child_array_element();
                let child_index =
                    table_index_by_scope(tables, &element_scope).ok_or_else(|| {
                        DerivationError::mapping(format!(
                            "no table scope found at {} on resource {}",
                            element_scope.canonical(),
                            params.inputs.resource
                        ))
                    })?;
                let items = super::array_items(array_schema, &property_path)?;
                match classify(items, &element_scope)? {
                    SchemaNode::Object(_) => {
                        walk_object(
                            params,
                            items,
                            &element_scope,
                            child_index,
                            &element_scope,
                            true,
                            tables,
                            edges,
                        )?;
                    }
                    SchemaNode::Scalar(item_schema) => {
                        // A descriptor value collection: the element itself is
                        // the descriptor column of the child table.
                        emit_leaf(
                            params,
                            item_schema,
                            &element_scope,
                            child_index,
                            &element_scope,
                            true,
                            tables,
                            edges,
                        )?;
                    }
                    SchemaNode::Array(_) => {
                        return Err(DerivationError::schema_shape(format!(
                            "arrays of arrays are not supported at {} on resource {}",
                            property_path.canonical(),
                            params.inputs.resource
                        )));
                    }
                }
            }
            SchemaNode::Scalar(leaf_schema) => {
                emit_leaf(
                    params,
                    leaf_schema,
                    &property_path,
                    table_index,
                    table_scope,
                    property_required,
                    tables,
                    edges,
                )?;
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_leaf(
    params: &ColumnDeriveParams<'_>,
    leaf_schema: &Map<String, Value>,
    path: &JsonPathExpression,
    table_index: usize,
    table_scope: &JsonPathExpression,
    required: bool,
    tables: &mut Vec<DbTableModel>,
    edges: &mut Vec<DescriptorEdgeSource>,
) -> Result<(), DerivationError> {
    let is_nullable = !required || super::is_x_nullable(leaf_schema);

    if is_nullable && params.identity_paths.contains(path.canonical()) {
        return Err(DerivationError::mapping(format!(
            "identity column for path '{}' on resource {} must be non-nullable",
            path.canonical(),
            params.inputs.resource
        )));
    }

    let base = column_base(path, table_scope);

    let column = if let Some(descriptor) = params.descriptor_paths.get(path.canonical()) {
        let name = naming::descriptor_id_column(&base);
        let table = &tables[table_index];
        let fk = TableConstraint::ForeignKey {
            name: naming::foreign_key_name(&table.table, &[base.clone()]),
            columns: vec![name.clone()],
            target_table: shared_descriptor_table(),
            target_columns: vec![DbColumnName::new(naming::DOCUMENT_ID)],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        };
        edges.push(DescriptorEdgeSource {
            descriptor_value_path: path.clone(),
            table: table.table.clone(),
            fk_column: name.clone(),
            descriptor_resource: descriptor.target.clone(),
            is_identity_component: descriptor.is_part_of_identity,
            is_required: descriptor.is_required,
        });
        tables[table_index].constraints.push(fk);
        DbColumnModel {
            name,
            kind: ColumnKind::DescriptorFk,
            scalar_type: Some(RelationalScalarType::Int64),
            is_nullable,
            source_json_path: Some(path.clone()),
            target_resource: Some(descriptor.target.clone()),
            storage: ColumnStorage::Stored,
        }
    } else {
        let scalar_type = resolve_scalar_type(
            leaf_schema,
            path,
            &params.inputs.decimal_infos,
            &params.inputs.string_max_length_omission_paths,
        )?;
        DbColumnModel {
            name: DbColumnName::new(&base),
            kind: ColumnKind::Scalar,
            scalar_type: Some(scalar_type),
            is_nullable,
            source_json_path: Some(path.clone()),
            target_resource: None,
            storage: ColumnStorage::Stored,
        }
    };

    push_column(params, tables, table_index, column)
}

/// The PascalCase column base: the joined relative segments; a bare array
/// element falls back to the singularized collection property.
fn column_base(path: &JsonPathExpression, table_scope: &JsonPathExpression) -> String {
    let relative = table_scope
        .relative_segments(path)
        .unwrap_or_default();
    let base = naming::column_base_for_segments(relative);
    if !base.is_empty() {
        return base;
    }
    // The element path of a scalar collection has no relative properties.
    let collection_property = table_scope
        .segments()
        .iter()
        .rev()
        .find_map(|segment| match segment {
            JsonPathSegment::Property(name) => Some(name.as_str()),
            JsonPathSegment::AnyArrayElement => None,
        })
        .unwrap_or_default();
    naming::collection_base_name(collection_property)
}

fn push_column(
    params: &ColumnDeriveParams<'_>,
    tables: &mut [DbTableModel],
    table_index: usize,
    column: DbColumnModel,
) -> Result<(), DerivationError> {
    let table = &mut tables[table_index];
    if let Some(existing) = table.column(&column.name) {
        let existing_path = existing
            .source_json_path
            .as_ref()
            .map(|path| path.canonical().to_string())
            .unwrap_or_else(|| "<key part>".to_string());
        let new_path = column
            .source_json_path
            .as_ref()
            .map(|path| path.canonical().to_string())
            .unwrap_or_default();
        return Err(DerivationError::mapping(format!(
            "column name '{}' on table '{}' is derived for both '{existing_path}' and '{new_path}' on resource {}; use relational.nameOverrides to disambiguate",
            column.name,
            table.table,
            params.inputs.resource
        )));
    }
    table.columns.push(column);
    Ok(())
}

pub(crate) fn shared_descriptor_table() -> DbTableName {
    DbTableName::new(
        DbSchemaName::new(naming::DESCRIPTOR_SCHEMA),
        naming::DESCRIPTOR_TABLE,
    )
}

/// Resolves the relational scalar type for a leaf schema node.
pub(crate) fn resolve_scalar_type(
    schema: &Map<String, Value>,
    path: &JsonPathExpression,
    decimal_infos: &BTreeMap<String, DecimalInfo>,
    omission_paths: &BTreeSet<String>,
) -> Result<RelationalScalarType, DerivationError> {
    let schema_type = schema.get("type").and_then(Value::as_str).ok_or_else(|| {
        DerivationError::schema_shape(format!(
            "schema type must be specified at {}",
            path.canonical()
        ))
    })?;
    let format = schema.get("format").and_then(Value::as_str);

    match schema_type {
        "boolean" => Ok(RelationalScalarType::Boolean),
        "integer" => Ok(match format {
            Some("int64") => RelationalScalarType::Int64,
            _ => RelationalScalarType::Int32,
        }),
        "number" => {
            let info = decimal_infos.get(path.canonical()).ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "decimal property validation info is required for number properties at {}",
                    path.canonical()
                ))
            })?;
            Ok(RelationalScalarType::Decimal {
                precision: info.total_digits,
                scale: info.decimal_places,
            })
        }
        "string" => match format {
            Some("date") => Ok(RelationalScalarType::Date),
            Some("date-time") => Ok(RelationalScalarType::DateTime),
            Some("time") => Ok(RelationalScalarType::Time),
            _ => resolve_string_type(schema, path, omission_paths),
        },
        other => Err(DerivationError::schema_shape(format!(
            "unsupported scalar type '{other}' at {}",
            path.canonical()
        ))),
    }
}

fn resolve_string_type(
    schema: &Map<String, Value>,
    path: &JsonPathExpression,
    omission_paths: &BTreeSet<String>,
) -> Result<RelationalScalarType, DerivationError> {
    match schema.get("maxLength") {
        None | Some(Value::Null) => {
            if omission_paths.contains(path.canonical()) {
                Ok(RelationalScalarType::String { max_length: None })
            } else {
                Err(DerivationError::schema_shape(format!(
                    "string schema at {} has no maxLength. Set maxLength or register the path in stringMaxLengthOmissionPaths",
                    path.canonical()
                )))
            }
        }
        Some(value) => {
            let max_length = value
                .as_u64()
                .and_then(|number| u32::try_from(number).ok())
                .filter(|number| *number > 0)
                .ok_or_else(|| {
                    DerivationError::schema_shape(format!(
                        "string schema maxLength must be positive at {}",
                        path.canonical()
                    ))
                })?;
            Ok(RelationalScalarType::String {
                max_length: Some(max_length),
            })
        }
    }
}
