//! Shape-checked accessors over raw `serde_json::Value` schema documents.
//!
//! Every accessor names the node it was reading (`what`) so shape errors point
//! at a concrete location in the input document.

use serde_json::{Map, Value};

use crate::error::DerivationError;

pub fn require_object<'a>(
    value: &'a Value,
    what: &str,
) -> Result<&'a Map<String, Value>, DerivationError> {
    value
        .as_object()
        .ok_or_else(|| DerivationError::schema_shape(format!("{what} must be an object")))
}

pub fn require_member<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a Value, DerivationError> {
    object
        .get(key)
        .ok_or_else(|| DerivationError::schema_shape(format!("{what} is missing '{key}'")))
}

pub fn require_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a str, DerivationError> {
    require_member(object, key, what)?
        .as_str()
        .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be a string")))
}

pub fn optional_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<Option<&'a str>, DerivationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be a string"))),
    }
}

pub fn require_bool(
    object: &Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<bool, DerivationError> {
    require_member(object, key, what)?
        .as_bool()
        .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be a boolean")))
}

pub fn optional_bool(
    object: &Map<String, Value>,
    key: &str,
    default: bool,
    what: &str,
) -> Result<bool, DerivationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be a boolean"))),
    }
}

pub fn require_array<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a Vec<Value>, DerivationError> {
    require_member(object, key, what)?
        .as_array()
        .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be an array")))
}

pub fn optional_array<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<Option<&'a Vec<Value>>, DerivationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_array()
            .map(Some)
            .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be an array"))),
    }
}

pub fn optional_object<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<Option<&'a Map<String, Value>>, DerivationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_object()
            .map(Some)
            .ok_or_else(|| DerivationError::schema_shape(format!("{what}.{key} must be an object"))),
    }
}

pub fn require_u32(
    object: &Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<u32, DerivationError> {
    require_member(object, key, what)?
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            DerivationError::schema_shape(format!("{what}.{key} must be a non-negative integer"))
        })
}

pub fn optional_u32(
    object: &Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<Option<u32>, DerivationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|number| u32::try_from(number).ok())
            .map(Some)
            .ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "{what}.{key} must be a non-negative integer"
                ))
            }),
    }
}
