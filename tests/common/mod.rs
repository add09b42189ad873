//! Common test utilities for relmodel tests

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use serde_json::{json, Value};

use relmodel::model::{
    ConcreteResourceModel, DbColumnModel, DbTableModel, DerivedRelationalModelSet,
    RelationalResourceModel,
};
use relmodel::{
    derive_model_set, DerivationError, DeriveOptions, EffectiveProjectSchema, EffectiveSchemaSet,
    SqlDialect,
};

/// Wraps a `projectSchema` body into a project document with consistent
/// placement metadata.
pub fn project(
    project_name: &str,
    endpoint_name: &str,
    is_extension: bool,
    resource_schemas: Value,
) -> EffectiveProjectSchema {
    project_with_abstracts(
        project_name,
        endpoint_name,
        is_extension,
        json!({}),
        resource_schemas,
    )
}

pub fn project_with_abstracts(
    project_name: &str,
    endpoint_name: &str,
    is_extension: bool,
    abstract_resources: Value,
    resource_schemas: Value,
) -> EffectiveProjectSchema {
    EffectiveProjectSchema {
        endpoint_name: endpoint_name.to_string(),
        project_name: project_name.to_string(),
        project_version: "1.0.0".to_string(),
        is_extension,
        api_schema: json!({
            "projectSchema": {
                "projectName": project_name,
                "projectEndpointName": endpoint_name,
                "isExtensionProject": is_extension,
                "apiSchemaFormatVersion": "1.0",
                "abstractResources": abstract_resources,
                "resourceSchemas": resource_schemas,
            }
        }),
    }
}

/// The standard core project for single-project scenarios.
pub fn core_project(resource_schemas: Value) -> EffectiveProjectSchema {
    project("Ed-Fi", "ed-fi", false, resource_schemas)
}

/// Installs the test tracing subscriber once; `RUST_LOG` controls verbosity.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn derive(projects: Vec<EffectiveProjectSchema>) -> DerivedRelationalModelSet {
    derive_with_dialect(projects, SqlDialect::Pgsql)
}

pub fn derive_with_dialect(
    projects: Vec<EffectiveProjectSchema>,
    dialect: SqlDialect,
) -> DerivedRelationalModelSet {
    init_tracing();
    let schema_set = EffectiveSchemaSet::assemble(projects).expect("schema set should assemble");
    derive_model_set(schema_set, &DeriveOptions { dialect }).expect("derivation should succeed")
}

/// Runs the derivation expecting it to fail, returning the error.
pub fn derive_err(projects: Vec<EffectiveProjectSchema>) -> DerivationError {
    init_tracing();
    let schema_set = EffectiveSchemaSet::assemble(projects).expect("schema set should assemble");
    derive_model_set(schema_set, &DeriveOptions::default())
        .expect_err("derivation should fail")
}

pub fn resource<'a>(
    set: &'a DerivedRelationalModelSet,
    project_name: &str,
    resource_name: &str,
) -> &'a ConcreteResourceModel {
    set.resources_in_name_order
        .iter()
        .find(|entry| {
            entry.resource_key.resource.project_name == project_name
                && entry.resource_key.resource.resource_name == resource_name
        })
        .unwrap_or_else(|| panic!("no model for {project_name}:{resource_name}"))
}

pub fn table<'a>(model: &'a RelationalResourceModel, name: &str) -> &'a DbTableModel {
    model
        .tables
        .iter()
        .find(|table| table.table.name() == name)
        .unwrap_or_else(|| panic!("no table named {name} on {}", model.resource))
}

pub fn column<'a>(table: &'a DbTableModel, name: &str) -> &'a DbColumnModel {
    table
        .columns
        .iter()
        .find(|column| column.name.as_str() == name)
        .unwrap_or_else(|| panic!("no column named {name} on {}", table.table))
}

pub fn column_names(table: &DbTableModel) -> Vec<&str> {
    table
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect()
}

/// A descriptor resource schema with the standard namespace/codeValue shape.
pub fn descriptor_schema(resource_name: &str) -> Value {
    json!({
        "resourceName": resource_name,
        "isDescriptor": true,
        "jsonSchemaForInsert": {
            "type": "object",
            "required": ["namespace", "codeValue"],
            "properties": {
                "namespace": {"type": "string", "maxLength": 255},
                "codeValue": {"type": "string", "maxLength": 50}
            }
        }
    })
}

/// A school resource with scalar properties, a nested collection tree, and a
/// descriptor value collection.
pub fn school_schema() -> Value {
    json!({
        "resourceName": "School",
        "isDescriptor": false,
        "identityJsonPaths": ["$.schoolId"],
        "documentPathsMapping": {
            "SchoolId": {
                "isReference": false,
                "isPartOfIdentity": true,
                "isRequired": true,
                "path": "$.schoolId"
            },
            "NameOfInstitution": {
                "isReference": false,
                "isRequired": true,
                "path": "$.nameOfInstitution"
            },
            "GradeLevelDescriptor": {
                "isReference": true,
                "isDescriptor": true,
                "projectName": "Ed-Fi",
                "resourceName": "GradeLevelDescriptor",
                "isRequired": false,
                "path": "$.gradeLevels[*].gradeLevelDescriptor"
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": ["schoolId", "nameOfInstitution"],
            "properties": {
                "schoolId": {"type": "integer"},
                "nameOfInstitution": {"type": "string", "maxLength": 75},
                "webSite": {"type": "string", "maxLength": 255},
                "addresses": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["streetNumberName"],
                        "properties": {
                            "streetNumberName": {"type": "string", "maxLength": 150},
                            "city": {"type": "string", "maxLength": 30},
                            "periods": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["beginDate"],
                                    "properties": {
                                        "beginDate": {"type": "string", "format": "date"}
                                    }
                                }
                            }
                        }
                    }
                },
                "gradeLevels": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["gradeLevelDescriptor"],
                        "properties": {
                            "gradeLevelDescriptor": {"type": "string", "maxLength": 306}
                        }
                    }
                }
            }
        }
    })
}

/// A minimal resource with one integer identity property.
pub fn simple_resource(resource_name: &str, identity_property: &str) -> Value {
    json!({
        "resourceName": resource_name,
        "isDescriptor": false,
        "identityJsonPaths": [format!("$.{identity_property}")],
        "documentPathsMapping": {
            "Identity": {
                "isReference": false,
                "isPartOfIdentity": true,
                "isRequired": true,
                "path": format!("$.{identity_property}")
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": [identity_property],
            "properties": {
                identity_property: {"type": "integer"}
            }
        }
    })
}
