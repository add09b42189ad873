//! Integration tests for resource extensions: `_ext` subtrees that attach
//! extension tables to another project's resource.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use relmodel::model::{ColumnKind, ReferentialAction, RelationalScalarType, TableConstraint};

use crate::common::{
    column, core_project, derive, derive_err, descriptor_schema, project, resource, school_schema,
    simple_resource, table,
};

fn school_extension_schema() -> Value {
    json!({
        "resourceName": "School",
        "isDescriptor": false,
        "isResourceExtension": true,
        "jsonSchemaForInsert": {
            "type": "object",
            "properties": {
                "_ext": {
                    "type": "object",
                    "properties": {
                        "sample": {
                            "type": "object",
                            "required": ["isExemplary"],
                            "properties": {
                                "isExemplary": {"type": "boolean"},
                                "buses": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "required": ["busNumber"],
                                        "properties": {
                                            "busNumber": {"type": "string", "maxLength": 20}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

fn extension_set() -> Vec<relmodel::EffectiveProjectSchema> {
    vec![
        core_project(json!({"schools": simple_resource("School", "schoolId")})),
        project(
            "Sample",
            "sample",
            true,
            json!({"schools": school_extension_schema()}),
        ),
    ]
}

// ============================================================================
// Extension Table Tests
// ============================================================================

#[test]
fn test_extension_table_attaches_to_base_resource() {
    let set = derive(extension_set());

    let school = resource(&set, "Ed-Fi", "School");
    let ext = table(&school.model, "SchoolExtension");
    assert_eq!(ext.table.to_string(), "sample.SchoolExtension");

    let is_exemplary = column(ext, "IsExemplary");
    assert_eq!(is_exemplary.scalar_type, Some(RelationalScalarType::Boolean));
    assert!(!is_exemplary.is_nullable);
    assert_eq!(
        is_exemplary.source_json_path.as_ref().map(|p| p.canonical()),
        Some("$._ext.sample.isExemplary")
    );
}

#[test]
fn test_extension_table_shares_owning_table_key() {
    let set = derive(extension_set());

    let school = resource(&set, "Ed-Fi", "School");
    let ext = table(&school.model, "SchoolExtension");
    assert_eq!(ext.key.name, "PK_SchoolExtension");
    assert_eq!(ext.key.columns.len(), 1);
    assert_eq!(ext.key.columns[0].name.as_str(), "DocumentId");

    let fk = ext
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::ForeignKey {
                name,
                target_table,
                on_delete,
                ..
            } if name == "FK_SchoolExtension_School" => Some((target_table, on_delete)),
            _ => None,
        });
    let (target_table, on_delete) = fk.expect("owning FK should exist");
    assert_eq!(target_table.to_string(), "edfi.School");
    assert_eq!(*on_delete, ReferentialAction::Cascade);
}

#[test]
fn test_extension_collection_table() {
    let set = derive(extension_set());

    let school = resource(&set, "Ed-Fi", "School");
    let buses = table(&school.model, "SchoolExtensionBus");
    assert_eq!(buses.table.to_string(), "sample.SchoolExtensionBus");

    let key_names: Vec<&str> = buses
        .key
        .columns
        .iter()
        .map(|part| part.name.as_str())
        .collect();
    assert_eq!(key_names, vec!["School_DocumentId", "Ordinal"]);
    assert_eq!(buses.key.columns[1].kind, ColumnKind::Ordinal);

    assert_eq!(
        column(buses, "BusNumber").scalar_type,
        Some(RelationalScalarType::String { max_length: Some(20) })
    );
}

#[test]
fn test_collection_scope_extension_keeps_nested_collection_key_parts_distinct() {
    let address_extension = json!({
        "resourceName": "School",
        "isDescriptor": false,
        "isResourceExtension": true,
        "jsonSchemaForInsert": {
            "type": "object",
            "properties": {
                "addresses": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "_ext": {
                                "type": "object",
                                "properties": {
                                    "sample": {
                                        "type": "object",
                                        "properties": {
                                            "inspections": {
                                                "type": "array",
                                                "items": {
                                                    "type": "object",
                                                    "required": ["inspectionDate"],
                                                    "properties": {
                                                        "inspectionDate": {
                                                            "type": "string",
                                                            "format": "date"
                                                        }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    });
    let set = derive(vec![
        core_project(json!({
            "schools": school_schema(),
            "gradeLevelDescriptors": descriptor_schema("GradeLevelDescriptor"),
        })),
        project("Sample", "sample", true, json!({"schools": address_extension})),
    ]);

    let school = resource(&set, "Ed-Fi", "School");
    let ext = table(&school.model, "SchoolAddressExtension");
    let ext_key: Vec<&str> = ext
        .key
        .columns
        .iter()
        .map(|part| part.name.as_str())
        .collect();
    assert_eq!(ext_key, vec!["School_DocumentId", "Ordinal"]);

    // The nested collection inherits the address ordinal under its renamed
    // key part and adds its own.
    let inspections = table(&school.model, "SchoolAddressExtensionInspection");
    let key_names: Vec<&str> = inspections
        .key
        .columns
        .iter()
        .map(|part| part.name.as_str())
        .collect();
    assert_eq!(key_names, vec!["School_DocumentId", "AddressOrdinal", "Ordinal"]);
}

// ============================================================================
// Extension Resolution Errors
// ============================================================================

#[test]
fn test_extension_without_base_resource_fails() {
    let err = derive_err(vec![
        core_project(json!({})),
        project(
            "Sample",
            "sample",
            true,
            json!({"schools": school_extension_schema()}),
        ),
    ]);
    let message = err.to_string();
    assert!(
        message.contains("does not match any concrete resource"),
        "unexpected error: {message}"
    );
}

#[test]
fn test_unknown_extension_project_key_fails() {
    let mut ext = school_extension_schema();
    let subtree = ext["jsonSchemaForInsert"]["properties"]["_ext"]["properties"]["sample"].take();
    ext["jsonSchemaForInsert"]["properties"]["_ext"]["properties"] =
        json!({"unknownProject": subtree});

    let err = derive_err(vec![
        core_project(json!({"schools": simple_resource("School", "schoolId")})),
        project("Sample", "sample", true, json!({"schools": ext})),
    ]);
    let message = err.to_string();
    assert!(
        message.contains("unknown extension project key 'unknownProject'"),
        "unexpected error: {message}"
    );
}
