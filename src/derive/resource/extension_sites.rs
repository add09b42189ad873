//! Step 3: discover `_ext` attachment points in the insert schema.

use serde_json::Value;

use crate::derive::resource::extract::{ExtensionSite, ResourceInputs};
use crate::derive::resource::{classify, SchemaNode};
use crate::error::DerivationError;
use crate::path::JsonPathExpression;

/// Walks the insert schema recording every `_ext` object together with its
/// owning table scope and the extension project keys declared under it.
pub fn discover_extension_sites(
    inputs: &ResourceInputs,
) -> Result<Vec<ExtensionSite>, DerivationError> {
    let mut sites = Vec::new();
    walk(
        inputs,
        &inputs.json_schema_for_insert,
        &JsonPathExpression::root(),
        &JsonPathExpression::root(),
        &mut sites,
    )?;
    Ok(sites)
}

fn walk(
    inputs: &ResourceInputs,
    value: &Value,
    path: &JsonPathExpression,
    owning_scope: &JsonPathExpression,
    sites: &mut Vec<ExtensionSite>,
) -> Result<(), DerivationError> {
    match classify(value, path)? {
        SchemaNode::Object(schema) => {
            let properties = super::properties(schema, path)?;
            for (name, property_schema) in properties {
                let property_path = path.child_property(name);
                if name == "_ext" {
                    sites.push(extension_site(
                        inputs,
                        property_schema,
                        &property_path,
                        owning_scope,
                    )?);
                    continue;
                }
                walk(inputs, property_schema, &property_path, owning_scope, sites)?;
            }
        }
        SchemaNode::Array(schema) => {
            let items = super::array_items(schema, path)?;
            let element_path = path.child_array_element();
            // An array element starts a new table scope.
            walk(inputs, items, &element_path, &element_path, sites)?;
        }
        SchemaNode::Scalar(_) => {}
    }
    Ok(())
}

fn extension_site(
    inputs: &ResourceInputs,
    value: &Value,
    extension_path: &JsonPathExpression,
    owning_scope: &JsonPathExpression,
) -> Result<ExtensionSite, DerivationError> {
    let schema = match classify(value, extension_path)? {
        SchemaNode::Object(schema) => schema,
        _ => {
            return Err(DerivationError::schema_shape(format!(
                "_ext at {} on resource {} must be an object schema",
                extension_path.canonical(),
                inputs.resource
            )));
        }
    };

    let properties = super::properties(schema, extension_path)?;
    // Key-sorted map iteration keeps project keys ordered.
    let project_keys: Vec<String> = properties.keys().cloned().collect();

    Ok(ExtensionSite {
        owning_scope: owning_scope.clone(),
        extension_path: extension_path.clone(),
        project_keys,
    })
}
