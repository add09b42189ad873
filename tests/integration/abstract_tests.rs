//! Integration tests for abstract resources: identity tables, union views,
//! and references that target an abstract resource.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use relmodel::model::{
    ReferentialAction, RelationalScalarType, TableConstraint, UnionArmProjection,
};

use crate::common::{derive, derive_err, project, project_with_abstracts, resource};

fn subclass_schema(
    resource_name: &str,
    identity_property: &str,
    identity_format: Option<&str>,
) -> Value {
    let path = format!("$.{identity_property}");
    let mut property = json!({"type": "integer"});
    if let Some(format) = identity_format {
        property["format"] = json!(format);
    }
    json!({
        "resourceName": resource_name,
        "isDescriptor": false,
        "isSubclass": true,
        "superclassProjectName": "Ed-Fi",
        "superclassResourceName": "EducationOrganization",
        "superclassIdentityJsonPath": "$.educationOrganizationId",
        "identityJsonPaths": [path],
        "documentPathsMapping": {
            "Identity": {
                "isReference": false,
                "isPartOfIdentity": true,
                "isRequired": true,
                "path": path
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": [identity_property],
            "properties": {
                identity_property: property
            }
        }
    })
}

fn education_organization_set() -> Vec<relmodel::EffectiveProjectSchema> {
    vec![project_with_abstracts(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "EducationOrganization": {
                "identityJsonPaths": ["$.educationOrganizationId"]
            }
        }),
        json!({
            "schools": subclass_schema("School", "schoolId", None),
            "localEducationAgencies":
                subclass_schema("LocalEducationAgency", "localEducationAgencyId", Some("int64")),
        }),
    )]
}

// ============================================================================
// Identity Table Tests
// ============================================================================

#[test]
fn test_abstract_identity_table_shape() {
    let set = derive(education_organization_set());

    assert_eq!(set.abstract_identity_tables_in_name_order.len(), 1);
    let info = &set.abstract_identity_tables_in_name_order[0];
    assert_eq!(
        info.abstract_resource_key.resource.to_string(),
        "Ed-Fi:EducationOrganization"
    );

    let table = &info.table;
    assert_eq!(table.table.to_string(), "edfi.EducationOrganizationIdentity");
    assert_eq!(table.key.name, "PK_EducationOrganizationIdentity");
    let column_names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        column_names,
        vec!["DocumentId", "EducationOrganizationId", "Discriminator"]
    );

    let unique = table
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::Unique { name, columns } => Some((name, columns)),
            _ => None,
        });
    let (name, columns) = unique.expect("identity unique constraint should exist");
    assert_eq!(name, "UX_EducationOrganizationIdentity_EducationOrganizationId");
    assert_eq!(columns[0].as_str(), "EducationOrganizationId");
}

#[test]
fn test_abstract_identity_column_widens_across_members() {
    let set = derive(education_organization_set());

    // School projects Int32, LocalEducationAgency projects Int64.
    let table = &set.abstract_identity_tables_in_name_order[0].table;
    let identity = table
        .columns
        .iter()
        .find(|c| c.name.as_str() == "EducationOrganizationId")
        .expect("identity column should exist");
    assert_eq!(identity.scalar_type, Some(RelationalScalarType::Int64));
}

// ============================================================================
// Union View Tests
// ============================================================================

#[test]
fn test_union_view_arms_in_member_name_order() {
    let set = derive(education_organization_set());

    assert_eq!(set.abstract_union_views_in_name_order.len(), 1);
    let view = &set.abstract_union_views_in_name_order[0];
    assert_eq!(view.view.to_string(), "edfi.EducationOrganization_View");

    let arm_resources: Vec<String> = view
        .arms
        .iter()
        .map(|arm| arm.member_resource_key.resource.to_string())
        .collect();
    assert_eq!(
        arm_resources,
        vec!["Ed-Fi:LocalEducationAgency", "Ed-Fi:School"]
    );
}

#[test]
fn test_union_view_arm_projections() {
    let set = derive(education_organization_set());

    let view = &set.abstract_union_views_in_name_order[0];
    let output_names: Vec<&str> = view
        .output_columns
        .iter()
        .map(|output| output.name.as_str())
        .collect();
    assert_eq!(
        output_names,
        vec!["DocumentId", "EducationOrganizationId", "Discriminator"]
    );
    assert_eq!(
        view.output_columns[2].scalar_type,
        RelationalScalarType::String { max_length: Some(256) }
    );

    let lea_arm = &view.arms[0];
    assert_eq!(lea_arm.source_table.to_string(), "edfi.LocalEducationAgency");
    assert_eq!(
        lea_arm.projections,
        vec![
            UnionArmProjection::SourceColumn {
                column: relmodel::model::DbColumnName::new("DocumentId"),
                scalar_type: Some(RelationalScalarType::Int64),
            },
            UnionArmProjection::SourceColumn {
                column: relmodel::model::DbColumnName::new("LocalEducationAgencyId"),
                scalar_type: Some(RelationalScalarType::Int64),
            },
            UnionArmProjection::StringLiteral("Ed-Fi:LocalEducationAgency".to_string()),
        ]
    );
}

// ============================================================================
// References to Abstract Resources
// ============================================================================

#[test]
fn test_reference_to_abstract_targets_identity_table() {
    let mut projects = education_organization_set();
    let api_schema = &mut projects[0].api_schema;
    api_schema["projectSchema"]["resourceSchemas"]["enrollments"] = json!({
        "resourceName": "Enrollment",
        "isDescriptor": false,
        "identityJsonPaths": ["$.enrollmentIdentifier"],
        "documentPathsMapping": {
            "EnrollmentIdentifier": {
                "isReference": false,
                "isPartOfIdentity": true,
                "isRequired": true,
                "path": "$.enrollmentIdentifier"
            },
            "EducationOrganization": {
                "isReference": true,
                "projectName": "Ed-Fi",
                "resourceName": "EducationOrganization",
                "isRequired": true,
                "referenceJsonPaths": [
                    {
                        "identityJsonPath": "$.educationOrganizationId",
                        "referenceJsonPath": "$.educationOrganizationReference.educationOrganizationId"
                    }
                ]
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": ["enrollmentIdentifier", "educationOrganizationReference"],
            "properties": {
                "enrollmentIdentifier": {"type": "string", "maxLength": 32},
                "educationOrganizationReference": {
                    "type": "object",
                    "required": ["educationOrganizationId"],
                    "properties": {
                        "educationOrganizationId": {"type": "integer"}
                    }
                }
            }
        }
    });
    let set = derive(projects);

    let root = resource(&set, "Ed-Fi", "Enrollment").model.root_table();
    let fk = root
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::ForeignKey {
                name,
                target_table,
                on_update,
                ..
            } if name == "FK_Enrollment_EducationOrganization" => {
                Some((target_table, on_update))
            }
            _ => None,
        });
    let (target_table, on_update) = fk.expect("abstract reference FK should exist");
    assert_eq!(target_table.to_string(), "edfi.EducationOrganizationIdentity");
    // Identity table rows are trigger maintained, so never cascade.
    assert_eq!(*on_update, ReferentialAction::NoAction);
}

// ============================================================================
// Abstract Resolution Errors
// ============================================================================

#[test]
fn test_abstract_without_members_fails() {
    let err = derive_err(vec![project_with_abstracts(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "EducationOrganization": {
                "identityJsonPaths": ["$.educationOrganizationId"]
            }
        }),
        json!({}),
    )]);
    let message = err.to_string();
    assert!(
        message.contains("has no concrete members"),
        "unexpected error: {message}"
    );
}

#[test]
fn test_duplicate_member_resource_name_fails() {
    let mut projects = education_organization_set();
    // A second project declaring another School subclass collides on the
    // member ResourceName the discriminator depends on.
    projects.push(project(
        "Sample",
        "sample",
        true,
        json!({
            "schools": {
                "resourceName": "School",
                "isDescriptor": false,
                "isSubclass": true,
                "superclassProjectName": "Ed-Fi",
                "superclassResourceName": "EducationOrganization",
                "superclassIdentityJsonPath": "$.educationOrganizationId",
                "identityJsonPaths": ["$.schoolId"],
                "documentPathsMapping": {
                    "Identity": {
                        "isReference": false,
                        "isPartOfIdentity": true,
                        "isRequired": true,
                        "path": "$.schoolId"
                    }
                },
                "jsonSchemaForInsert": {
                    "type": "object",
                    "required": ["schoolId"],
                    "properties": {
                        "schoolId": {"type": "integer"}
                    }
                }
            }
        }),
    ));
    let err = derive_err(projects);
    let message = err.to_string();
    assert!(
        message.contains("duplicate member ResourceName 'School'"),
        "unexpected error: {message}"
    );
}

#[test]
fn test_discriminator_literal_over_max_length_fails() {
    // The discriminator value is the qualified member name; a member named
    // past the column width cannot be projected.
    let long_name = "X".repeat(300);
    let err = derive_err(vec![project_with_abstracts(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "EducationOrganization": {
                "identityJsonPaths": ["$.educationOrganizationId"]
            }
        }),
        json!({
            "schools": subclass_schema(&long_name, "schoolId", None),
        }),
    )]);
    let message = err.to_string();
    assert!(
        message.contains("exceeds 256 characters"),
        "unexpected error: {message}"
    );
}

#[test]
fn test_member_renaming_superclass_path_needs_single_identity() {
    let mut member = subclass_schema("School", "schoolId", None);
    member["identityJsonPaths"] = json!(["$.schoolId", "$.campusCode"]);
    member["documentPathsMapping"]["CampusCode"] = json!({
        "isReference": false,
        "isPartOfIdentity": true,
        "isRequired": true,
        "path": "$.campusCode"
    });
    member["jsonSchemaForInsert"]["required"] = json!(["schoolId", "campusCode"]);
    member["jsonSchemaForInsert"]["properties"]["campusCode"] =
        json!({"type": "string", "maxLength": 20});

    let err = derive_err(vec![project_with_abstracts(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "EducationOrganization": {
                "identityJsonPaths": ["$.educationOrganizationId"]
            }
        }),
        json!({"schools": member}),
    )]);
    let message = err.to_string();
    assert!(
        message.contains("instead of exactly one"),
        "unexpected error: {message}"
    );
}
