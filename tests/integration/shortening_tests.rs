//! Integration tests for dialect-specific identifier shortening.

use pretty_assertions::assert_eq;
use serde_json::json;

use relmodel::dialect::sha256_hex_prefix;
use relmodel::SqlDialect;

use crate::common::{core_project, derive, derive_with_dialect, resource};

const LONG_COLLECTION_TABLE: &str =
    "StudentSpecialEducationProgramAssociationIndividualizedEducationProgramAccommodation";

fn long_name_set() -> Vec<relmodel::EffectiveProjectSchema> {
    vec![core_project(json!({
        "studentSpecialEducationProgramAssociations": {
            "resourceName": "StudentSpecialEducationProgramAssociation",
            "isDescriptor": false,
            "identityJsonPaths": ["$.associationId"],
            "documentPathsMapping": {
                "AssociationId": {
                    "isReference": false,
                    "isPartOfIdentity": true,
                    "isRequired": true,
                    "path": "$.associationId"
                }
            },
            "jsonSchemaForInsert": {
                "type": "object",
                "required": ["associationId"],
                "properties": {
                    "associationId": {"type": "integer"},
                    "individualizedEducationProgramAccommodations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["accommodationDescription"],
                            "properties": {
                                "accommodationDescription": {"type": "string", "maxLength": 60}
                            }
                        }
                    }
                }
            }
        }
    }))]
}

fn expected_short(full: &str) -> String {
    format!("{}_{}", &full[..54], sha256_hex_prefix(full, 8))
}

// ============================================================================
// Pgsql Shortening Tests
// ============================================================================

#[test]
fn test_pgsql_truncates_overlong_table_name() {
    let set = derive(long_name_set());

    let model = &resource(&set, "Ed-Fi", "StudentSpecialEducationProgramAssociation").model;
    let expected = expected_short(LONG_COLLECTION_TABLE);
    assert_eq!(expected.chars().count(), 63);

    let shortened = model
        .tables
        .iter()
        .find(|table| table.table.name() == expected)
        .expect("shortened collection table should exist");
    // Columns fit the limit and keep their names.
    assert!(shortened
        .columns
        .iter()
        .any(|column| column.name.as_str() == "AccommodationDescription"));
    assert_eq!(
        shortened.key.name,
        expected_short(&format!("PK_{LONG_COLLECTION_TABLE}"))
    );
}

#[test]
fn test_pgsql_rewrites_constraint_names_consistently() {
    let set = derive(long_name_set());

    let model = &resource(&set, "Ed-Fi", "StudentSpecialEducationProgramAssociation").model;
    for table in &model.tables {
        assert!(table.table.name().chars().count() <= 63);
        assert!(table.key.name.chars().count() <= 63);
        for column in &table.columns {
            assert!(column.name.as_str().chars().count() <= 63);
        }
        for constraint in &table.constraints {
            let name = match constraint {
                relmodel::model::TableConstraint::ForeignKey { name, .. } => name,
                relmodel::model::TableConstraint::Unique { name, .. } => name,
                relmodel::model::TableConstraint::AllOrNoneNullability { name, .. } => name,
                relmodel::model::TableConstraint::NullOrTrue { name, .. } => name,
            };
            assert!(name.chars().count() <= 63, "overlong constraint name {name}");
        }
    }
}

#[test]
fn test_shortening_is_stable_across_runs() {
    let first = derive(long_name_set());
    let second = derive(long_name_set());
    assert_eq!(first, second);
}

// ============================================================================
// Mssql Limit Tests
// ============================================================================

#[test]
fn test_mssql_keeps_names_under_its_longer_limit() {
    let set = derive_with_dialect(long_name_set(), SqlDialect::Mssql);

    let model = &resource(&set, "Ed-Fi", "StudentSpecialEducationProgramAssociation").model;
    assert!(model
        .tables
        .iter()
        .any(|table| table.table.name() == LONG_COLLECTION_TABLE));
}
