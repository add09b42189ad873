//! The per-resource derivation pipeline.
//!
//! Each concrete resource runs six steps in order: input extraction, insert
//! schema validation, extension site discovery, table scope and key
//! derivation, column derivation with descriptor edge binding, and canonical
//! ordering. Shared JSON Schema walking helpers live here.

pub mod columns;
pub mod extension_sites;
pub mod extract;
pub mod ordering;
pub mod scopes;
pub mod validate;

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::DerivationError;
use crate::path::{JsonPathExpression, JsonPathSegment};

/// A classified JSON Schema node.
pub(crate) enum SchemaNode<'a> {
    Object(&'a Map<String, Value>),
    Array(&'a Map<String, Value>),
    Scalar(&'a Map<String, Value>),
}

pub(crate) fn schema_object<'a>(
    value: &'a Value,
    path: &JsonPathExpression,
) -> Result<&'a Map<String, Value>, DerivationError> {
    value.as_object().ok_or_else(|| {
        DerivationError::schema_shape(format!(
            "schema node at {} must be an object",
            path.canonical()
        ))
    })
}

pub(crate) fn schema_type<'a>(
    schema: &'a Map<String, Value>,
    path: &JsonPathExpression,
) -> Result<&'a str, DerivationError> {
    let node = schema.get("type").ok_or_else(|| {
        DerivationError::schema_shape(format!(
            "schema type must be specified at {}",
            path.canonical()
        ))
    })?;
    node.as_str().ok_or_else(|| {
        DerivationError::schema_shape(format!(
            "schema type must be a single string at {}",
            path.canonical()
        ))
    })
}

/// Classifies a schema node by its `type`.
pub(crate) fn classify<'a>(
    value: &'a Value,
    path: &JsonPathExpression,
) -> Result<SchemaNode<'a>, DerivationError> {
    let schema = schema_object(value, path)?;
    match schema_type(schema, path)? {
        "object" => Ok(SchemaNode::Object(schema)),
        "array" => Ok(SchemaNode::Array(schema)),
        "string" | "integer" | "number" | "boolean" => Ok(SchemaNode::Scalar(schema)),
        other => Err(DerivationError::schema_shape(format!(
            "unsupported scalar type '{other}' at {}",
            path.canonical()
        ))),
    }
}

pub(crate) fn properties<'a>(
    schema: &'a Map<String, Value>,
    path: &JsonPathExpression,
) -> Result<&'a Map<String, Value>, DerivationError> {
    static EMPTY: once_cell::sync::Lazy<Map<String, Value>> =
        once_cell::sync::Lazy::new(Map::new);
    match schema.get("properties") {
        None => Ok(&EMPTY),
        Some(value) => value.as_object().ok_or_else(|| {
            DerivationError::schema_shape(format!(
                "schema properties must be an object at {}",
                path.canonical()
            ))
        }),
    }
}

pub(crate) fn required_set(
    schema: &Map<String, Value>,
    path: &JsonPathExpression,
) -> Result<BTreeSet<String>, DerivationError> {
    let mut required = BTreeSet::new();
    if let Some(value) = schema.get("required") {
        let entries = value.as_array().ok_or_else(|| {
            DerivationError::schema_shape(format!(
                "schema required must be an array at {}",
                path.canonical()
            ))
        })?;
        for entry in entries {
            let name = entry.as_str().ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "schema required entries must be strings at {}",
                    path.canonical()
                ))
            })?;
            required.insert(name.to_string());
        }
    }
    Ok(required)
}

pub(crate) fn array_items<'a>(
    schema: &'a Map<String, Value>,
    path: &JsonPathExpression,
) -> Result<&'a Value, DerivationError> {
    schema.get("items").ok_or_else(|| {
        DerivationError::schema_shape(format!(
            "array schema at {} must declare items",
            path.canonical()
        ))
    })
}

pub(crate) fn is_x_nullable(schema: &Map<String, Value>) -> bool {
    schema
        .get("x-nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolves a compiled path against an insert schema, following `properties`
/// for property segments and `items` for array wildcards.
pub(crate) fn resolve_schema_path<'a>(
    root: &'a Value,
    path: &JsonPathExpression,
) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        let schema = current.as_object()?;
        match segment {
            JsonPathSegment::Property(name) => {
                current = schema.get("properties")?.as_object()?.get(name)?;
            }
            JsonPathSegment::AnyArrayElement => {
                current = schema.get("items")?;
            }
        }
    }
    Some(current)
}
