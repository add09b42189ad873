//! Step 2: validate the insert schema against the supported JSON Schema
//! subset, and check that all declared paths exist in it.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::derive::resource::extract::{
    ArrayUniquenessConstraint, DocumentPathKind, ResourceInputs,
};
use crate::derive::resource::{classify, resolve_schema_path, SchemaNode};
use crate::error::DerivationError;
use crate::path::JsonPathExpression;

const UNSUPPORTED_KEYWORDS: &[&str] = &["$ref", "oneOf", "anyOf", "allOf", "patternProperties"];

/// Validates the insert schema shape and the existence of every declared
/// document path.
pub fn validate_insert_schema(inputs: &ResourceInputs) -> Result<(), DerivationError> {
    let descriptor_paths = descriptor_value_paths(inputs);
    walk(
        inputs,
        &inputs.json_schema_for_insert,
        &JsonPathExpression::root(),
        &descriptor_paths,
    )?;
    validate_declared_paths(inputs)?;
    Ok(())
}

fn descriptor_value_paths(inputs: &ResourceInputs) -> BTreeSet<String> {
    inputs
        .document_paths
        .iter()
        .filter_map(|mapping| match &mapping.kind {
            DocumentPathKind::Descriptor { path, .. } => Some(path.canonical().to_string()),
            _ => None,
        })
        .collect()
}

fn walk(
    inputs: &ResourceInputs,
    value: &Value,
    path: &JsonPathExpression,
    descriptor_paths: &BTreeSet<String>,
) -> Result<(), DerivationError> {
    let node = classify(value, path)?;
    let schema = match &node {
        SchemaNode::Object(schema) | SchemaNode::Array(schema) | SchemaNode::Scalar(schema) => {
            *schema
        }
    };

    for keyword in UNSUPPORTED_KEYWORDS {
        if schema.contains_key(*keyword) {
            return Err(DerivationError::schema_shape(format!(
                "unsupported keyword '{keyword}' at {} on resource {}",
                path.canonical(),
                inputs.resource
            )));
        }
    }

    if schema.contains_key("enum") && !descriptor_paths.contains(path.canonical()) {
        return Err(DerivationError::schema_shape(format!(
            "unsupported keyword 'enum' at {} on resource {}",
            path.canonical(),
            inputs.resource
        )));
    }

    match node {
        SchemaNode::Object(schema) => {
            // additionalProperties subtrees are pruned, not derived.
            let properties = super::properties(schema, path)?;
            for (name, property_schema) in properties {
                walk(
                    inputs,
                    property_schema,
                    &path.child_property(name),
                    descriptor_paths,
                )?;
            }
        }
        SchemaNode::Array(schema) => {
            let items = super::array_items(schema, path)?;
            let element_path = path.child_array_element();
            let element = classify(items, &element_path)?;
            match element {
                SchemaNode::Object(_) => {
                    walk(inputs, items, &element_path, descriptor_paths)?;
                }
                SchemaNode::Scalar(_) => {
                    // Scalar element arrays are only supported for descriptor
                    // value collections.
                    if !descriptor_paths.contains(element_path.canonical()) {
                        return Err(DerivationError::schema_shape(format!(
                            "arrays of scalars are not supported at {} on resource {}",
                            path.canonical(),
                            inputs.resource
                        )));
                    }
                    walk(inputs, items, &element_path, descriptor_paths)?;
                }
                SchemaNode::Array(_) => {
                    return Err(DerivationError::schema_shape(format!(
                        "arrays of arrays are not supported at {} on resource {}",
                        path.canonical(),
                        inputs.resource
                    )));
                }
            }
        }
        SchemaNode::Scalar(_) => {}
    }

    Ok(())
}

fn validate_declared_paths(inputs: &ResourceInputs) -> Result<(), DerivationError> {
    for path in &inputs.identity_json_paths {
        require_path_exists(inputs, path, "identityJsonPath")?;
    }

    for mapping in &inputs.document_paths {
        match &mapping.kind {
            DocumentPathKind::Scalar { path } | DocumentPathKind::Descriptor { path, .. } => {
                require_path_exists(inputs, path, "documentPathsMapping path")?;
            }
            DocumentPathKind::Reference {
                reference_json_paths,
                ..
            } => {
                for pair in reference_json_paths {
                    require_path_exists(inputs, &pair.reference_json_path, "referenceJsonPath")?;
                }
            }
        }
    }

    for constraint in &inputs.array_uniqueness_constraints {
        validate_array_uniqueness_paths(inputs, constraint)?;
    }

    Ok(())
}

fn validate_array_uniqueness_paths(
    inputs: &ResourceInputs,
    constraint: &ArrayUniquenessConstraint,
) -> Result<(), DerivationError> {
    if let Some(base_path) = &constraint.base_path {
        require_path_exists(inputs, base_path, "arrayUniquenessConstraint basePath")?;
    }
    for path in &constraint.paths {
        require_path_exists(inputs, path, "arrayUniquenessConstraint path")?;
    }
    for nested in &constraint.nested {
        validate_array_uniqueness_paths(inputs, nested)?;
    }
    Ok(())
}

fn require_path_exists(
    inputs: &ResourceInputs,
    path: &JsonPathExpression,
    what: &str,
) -> Result<(), DerivationError> {
    if resolve_schema_path(&inputs.json_schema_for_insert, path).is_none() {
        return Err(DerivationError::mapping(format!(
            "{what} '{}' does not exist in jsonSchemaForInsert for resource {}",
            path.canonical(),
            inputs.resource
        )));
    }
    Ok(())
}
