//! Integration tests for document reference binding and the constraints
//! derived from it.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use relmodel::model::{ColumnKind, ReferentialAction, RelationalScalarType, TableConstraint};
use relmodel::SqlDialect;

use crate::common::{column, core_project, derive, derive_with_dialect, resource, table};

fn local_education_agency() -> Value {
    json!({
        "resourceName": "LocalEducationAgency",
        "isDescriptor": false,
        "allowIdentityUpdates": true,
        "identityJsonPaths": ["$.localEducationAgencyId"],
        "documentPathsMapping": {
            "LocalEducationAgencyId": {
                "isReference": false,
                "isPartOfIdentity": true,
                "isRequired": true,
                "path": "$.localEducationAgencyId"
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": ["localEducationAgencyId"],
            "properties": {
                "localEducationAgencyId": {"type": "integer"}
            }
        }
    })
}

fn school_with_lea_reference(required: bool) -> Value {
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
            "LocalEducationAgency": {
                "isReference": true,
                "projectName": "Ed-Fi",
                "resourceName": "LocalEducationAgency",
                "isRequired": required,
                "referenceJsonPaths": [
                    {
                        "identityJsonPath": "$.localEducationAgencyId",
                        "referenceJsonPath": "$.localEducationAgencyReference.localEducationAgencyId"
                    }
                ]
            }
        },
        "jsonSchemaForInsert": {
            "type": "object",
            "required": ["schoolId"],
            "properties": {
                "schoolId": {"type": "integer"},
                "localEducationAgencyReference": {
                    "type": "object",
                    "required": ["localEducationAgencyId"],
                    "properties": {
                        "localEducationAgencyId": {"type": "integer"}
                    }
                }
            }
        }
    })
}

fn lea_reference_set(required: bool) -> Vec<relmodel::EffectiveProjectSchema> {
    vec![core_project(json!({
        "schools": school_with_lea_reference(required),
        "localEducationAgencies": local_education_agency(),
    }))]
}

// ============================================================================
// FK Column and Projection Tests
// ============================================================================

#[test]
fn test_reference_produces_document_fk_column() {
    let set = derive(lea_reference_set(false));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let fk = column(root, "LocalEducationAgency_DocumentId");
    assert_eq!(fk.kind, ColumnKind::DocumentFk);
    assert_eq!(fk.scalar_type, Some(RelationalScalarType::Int64));
    assert!(fk.is_nullable);
    assert_eq!(
        fk.target_resource.as_ref().map(ToString::to_string),
        Some("Ed-Fi:LocalEducationAgency".to_string())
    );
    assert_eq!(
        fk.source_json_path.as_ref().map(|p| p.canonical()),
        Some("$.localEducationAgencyReference")
    );
}

#[test]
fn test_reference_projects_identity_columns() {
    let set = derive(lea_reference_set(false));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let projected = column(root, "LocalEducationAgency_LocalEducationAgencyId");
    assert_eq!(projected.kind, ColumnKind::Scalar);
    assert_eq!(projected.scalar_type, Some(RelationalScalarType::Int32));
    assert!(projected.is_nullable);
    assert_eq!(
        projected.source_json_path.as_ref().map(|p| p.canonical()),
        Some("$.localEducationAgencyReference.localEducationAgencyId")
    );
}

#[test]
fn test_reference_binding_is_recorded() {
    let set = derive(lea_reference_set(true));

    let school = resource(&set, "Ed-Fi", "School");
    assert_eq!(school.model.document_reference_bindings.len(), 1);
    let binding = &school.model.document_reference_bindings[0];
    assert_eq!(binding.reference_object_path.canonical(), "$.localEducationAgencyReference");
    assert_eq!(binding.table.to_string(), "edfi.School");
    assert_eq!(binding.fk_column.as_str(), "LocalEducationAgency_DocumentId");
    assert!(binding.is_required);
    assert_eq!(binding.identity_bindings.len(), 1);
    assert_eq!(
        binding.identity_bindings[0].column.as_str(),
        "LocalEducationAgency_LocalEducationAgencyId"
    );
}

#[test]
fn test_required_reference_columns_are_non_nullable() {
    let set = derive(lea_reference_set(true));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    assert!(!column(root, "LocalEducationAgency_DocumentId").is_nullable);
    assert!(!column(root, "LocalEducationAgency_LocalEducationAgencyId").is_nullable);
}

// ============================================================================
// FK Constraint Tests
// ============================================================================

#[test]
fn test_reference_fk_targets_root_table_with_cascade_on_pgsql() {
    let set = derive(lea_reference_set(false));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let fk = root
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::ForeignKey {
                name,
                target_table,
                target_columns,
                on_delete,
                on_update,
                ..
            } if name == "FK_School_LocalEducationAgency" => {
                Some((target_table, target_columns, on_delete, on_update))
            }
            _ => None,
        });
    let (target_table, target_columns, on_delete, on_update) =
        fk.expect("reference FK should exist");
    assert_eq!(target_table.to_string(), "edfi.LocalEducationAgency");
    assert_eq!(target_columns[0].as_str(), "DocumentId");
    assert_eq!(*on_delete, ReferentialAction::NoAction);
    // The target allows identity updates and pgsql cascades them.
    assert_eq!(*on_update, ReferentialAction::Cascade);
}

#[test]
fn test_reference_fk_does_not_cascade_on_mssql() {
    let set = derive_with_dialect(lea_reference_set(false), SqlDialect::Mssql);

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let on_update = root
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::ForeignKey { name, on_update, .. }
                if name == "FK_School_LocalEducationAgency" =>
            {
                Some(*on_update)
            }
            _ => None,
        });
    assert_eq!(on_update, Some(ReferentialAction::NoAction));
}

#[test]
fn test_optional_reference_gets_all_or_none_constraint() {
    let set = derive(lea_reference_set(false));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let all_or_none = root
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::AllOrNoneNullability {
                name,
                fk_column,
                dependent_columns,
            } => Some((name, fk_column, dependent_columns)),
            _ => None,
        });
    let (name, fk_column, dependent_columns) =
        all_or_none.expect("all-or-none constraint should exist");
    assert_eq!(name, "CK_School_LocalEducationAgency_AllNone");
    assert_eq!(fk_column.as_str(), "LocalEducationAgency_DocumentId");
    assert_eq!(dependent_columns.len(), 1);
    assert_eq!(
        dependent_columns[0].as_str(),
        "LocalEducationAgency_LocalEducationAgencyId"
    );
}

#[test]
fn test_required_reference_has_no_all_or_none_constraint() {
    let set = derive(lea_reference_set(true));

    let root = resource(&set, "Ed-Fi", "School").model.root_table();
    let has_all_or_none = root
        .constraints
        .iter()
        .any(|constraint| matches!(constraint, TableConstraint::AllOrNoneNullability { .. }));
    assert!(!has_all_or_none);
}

// ============================================================================
// References in Collections
// ============================================================================

#[test]
fn test_reference_inside_collection_binds_to_collection_table() {
    let set = derive(vec![core_project(json!({
        "localEducationAgencies": local_education_agency(),
        "reportCards": {
            "resourceName": "ReportCard",
            "isDescriptor": false,
            "identityJsonPaths": ["$.reportCardIdentifier"],
            "documentPathsMapping": {
                "ReportCardIdentifier": {
                    "isReference": false,
                    "isPartOfIdentity": true,
                    "isRequired": true,
                    "path": "$.reportCardIdentifier"
                },
                "LocalEducationAgency": {
                    "isReference": true,
                    "projectName": "Ed-Fi",
                    "resourceName": "LocalEducationAgency",
                    "isRequired": true,
                    "referenceJsonPaths": [
                        {
                            "identityJsonPath": "$.localEducationAgencyId",
                            "referenceJsonPath": "$.grades[*].localEducationAgencyReference.localEducationAgencyId"
                        }
                    ]
                }
            },
            "jsonSchemaForInsert": {
                "type": "object",
                "required": ["reportCardIdentifier"],
                "properties": {
                    "reportCardIdentifier": {"type": "string", "maxLength": 60},
                    "grades": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["localEducationAgencyReference"],
                            "properties": {
                                "letterGrade": {"type": "string", "maxLength": 20},
                                "localEducationAgencyReference": {
                                    "type": "object",
                                    "required": ["localEducationAgencyId"],
                                    "properties": {
                                        "localEducationAgencyId": {"type": "integer"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }))]);

    let report_card = resource(&set, "Ed-Fi", "ReportCard");
    let grades = table(&report_card.model, "ReportCardGrade");
    let fk = column(grades, "LocalEducationAgency_DocumentId");
    assert_eq!(fk.kind, ColumnKind::DocumentFk);

    let binding = &report_card.model.document_reference_bindings[0];
    assert_eq!(binding.table.to_string(), "edfi.ReportCardGrade");
    assert_eq!(
        binding.reference_object_path.canonical(),
        "$.grades[*].localEducationAgencyReference"
    );
}

// ============================================================================
// Identity Component References
// ============================================================================

#[test]
fn test_identity_unique_constraint_uses_reference_fk_column() {
    let set = derive(vec![core_project(json!({
        "agencies": {
            "resourceName": "Agency",
            "isDescriptor": false,
            "identityJsonPaths": ["$.agencyId"],
            "documentPathsMapping": {
                "AgencyId": {
                    "isReference": false,
                    "isPartOfIdentity": true,
                    "isRequired": true,
                    "path": "$.agencyId"
                }
            },
            "jsonSchemaForInsert": {
                "type": "object",
                "required": ["agencyId"],
                "properties": {
                    "agencyId": {"type": "integer"}
                }
            }
        },
        "grants": {
            "resourceName": "Grant",
            "isDescriptor": false,
            "identityJsonPaths": [
                "$.grantNumber",
                "$.agencyReference.agencyId"
            ],
            "documentPathsMapping": {
                "GrantNumber": {
                    "isReference": false,
                    "isPartOfIdentity": true,
                    "isRequired": true,
                    "path": "$.grantNumber"
                },
                "Agency": {
                    "isReference": true,
                    "isPartOfIdentity": true,
                    "projectName": "Ed-Fi",
                    "resourceName": "Agency",
                    "isRequired": true,
                    "referenceJsonPaths": [
                        {
                            "identityJsonPath": "$.agencyId",
                            "referenceJsonPath": "$.agencyReference.agencyId"
                        }
                    ]
                }
            },
            "jsonSchemaForInsert": {
                "type": "object",
                "required": ["grantNumber", "agencyReference"],
                "properties": {
                    "grantNumber": {"type": "string", "maxLength": 20},
                    "agencyReference": {
                        "type": "object",
                        "required": ["agencyId"],
                        "properties": {
                            "agencyId": {"type": "integer"}
                        }
                    }
                }
            }
        }
    }))]);

    let root = resource(&set, "Ed-Fi", "Grant").model.root_table();
    let unique = root
        .constraints
        .iter()
        .find_map(|constraint| match constraint {
            TableConstraint::Unique { name, columns } if name.starts_with("UX_") => {
                Some((name.clone(), columns.clone()))
            }
            _ => None,
        });
    let (name, columns) = unique.expect("identity unique constraint should exist");
    assert_eq!(name, "UX_Grant_GrantNumber_Agency_DocumentId");
    let column_names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
    assert_eq!(column_names, vec!["GrantNumber", "Agency_DocumentId"]);
}
