//! Integration tests for derivation failures on malformed or unsupported
//! input schemas.

use serde_json::{json, Value};

use crate::common::{core_project, derive_err, simple_resource};

fn err_message(resource_schemas: Value) -> String {
    derive_err(vec![core_project(resource_schemas)]).to_string()
}

fn assert_contains(message: &str, needle: &str) {
    assert!(message.contains(needle), "unexpected error: {message}");
}

// ============================================================================
// Unsupported Schema Keywords
// ============================================================================

#[test]
fn test_ref_keyword_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["address"] =
        json!({"$ref": "#/definitions/address"});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "unsupported keyword '$ref'");
}

#[test]
fn test_one_of_keyword_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["value"] =
        json!({"oneOf": [{"type": "integer"}, {"type": "string", "maxLength": 5}]});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "unsupported keyword 'oneOf'");
}

#[test]
fn test_enum_outside_descriptor_value_path_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["category"] =
        json!({"type": "string", "maxLength": 10, "enum": ["A", "B"]});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "unsupported keyword 'enum'");
}

#[test]
fn test_scalar_array_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["tags"] =
        json!({"type": "array", "items": {"type": "string", "maxLength": 10}});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "arrays of scalars are not supported");
}

// ============================================================================
// Scalar Type Resolution Errors
// ============================================================================

#[test]
fn test_string_without_max_length_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["shortName"] = json!({"type": "string"});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "$.shortName");
    assert_contains(&message, "Set maxLength");
}

#[test]
fn test_number_without_decimal_info_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["properties"]["latitude"] = json!({"type": "number"});
    let message = err_message(json!({"schools": school}));
    assert_contains(
        &message,
        "decimal property validation info is required for number properties at $.latitude",
    );
}

// ============================================================================
// Identity and Mapping Errors
// ============================================================================

#[test]
fn test_nullable_identity_column_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["jsonSchemaForInsert"]["required"] = json!([]);
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "must be non-nullable");
}

#[test]
fn test_declared_mapping_path_must_exist() {
    let mut school = simple_resource("School", "schoolId");
    school["documentPathsMapping"]["Missing"] = json!({
        "isReference": false,
        "isRequired": false,
        "path": "$.doesNotExist"
    });
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "does not exist in jsonSchemaForInsert");
}

#[test]
fn test_duplicate_column_name_requires_override() {
    let mut school = simple_resource("School", "schoolId");
    // Both flatten to the column name NameFirst.
    school["jsonSchemaForInsert"]["properties"]["name"] = json!({
        "type": "object",
        "properties": {
            "first": {"type": "string", "maxLength": 10}
        }
    });
    school["jsonSchemaForInsert"]["properties"]["nameFirst"] =
        json!({"type": "string", "maxLength": 10});
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "use relational.nameOverrides to disambiguate");
}

// ============================================================================
// Name Override Errors
// ============================================================================

#[test]
fn test_name_override_on_scalar_path_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["relational"] = json!({
        "nameOverrides": {"$.schoolId": "Identifier"}
    });
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "does not target a document reference");
}

#[test]
fn test_name_override_inside_reference_must_name_an_identity_path() {
    let mut school = simple_resource("School", "schoolId");
    school["documentPathsMapping"]["District"] = json!({
        "isReference": true,
        "projectName": "Ed-Fi",
        "resourceName": "District",
        "isRequired": false,
        "referenceJsonPaths": [
            {
                "identityJsonPath": "$.districtId",
                "referenceJsonPath": "$.districtReference.districtId"
            }
        ]
    });
    school["relational"] = json!({
        "nameOverrides": {"$.districtReference.districtName": "Name"}
    });
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "Only reference identity paths may be overridden");
}

// ============================================================================
// Reference Resolution Errors
// ============================================================================

#[test]
fn test_unknown_reference_target_is_rejected() {
    let mut school = simple_resource("School", "schoolId");
    school["documentPathsMapping"]["District"] = json!({
        "isReference": true,
        "projectName": "Ed-Fi",
        "resourceName": "District",
        "isRequired": false,
        "referenceJsonPaths": [
            {
                "identityJsonPath": "$.districtId",
                "referenceJsonPath": "$.districtReference.districtId"
            }
        ]
    });
    school["jsonSchemaForInsert"]["properties"]["districtReference"] = json!({
        "type": "object",
        "properties": {
            "districtId": {"type": "integer"}
        }
    });
    let message = err_message(json!({"schools": school}));
    assert_contains(&message, "is not part of the effective schema set");
}

#[test]
fn test_reference_json_path_must_exist() {
    let mut school = simple_resource("School", "schoolId");
    school["documentPathsMapping"]["Partner"] = json!({
        "isReference": true,
        "projectName": "Ed-Fi",
        "resourceName": "Partner",
        "isRequired": false,
        "referenceJsonPaths": [
            {
                "identityJsonPath": "$.partnerId",
                "referenceJsonPath": "$.partnerReference.partnerId"
            }
        ]
    });
    let message = err_message(json!({
        "schools": school,
        "partners": simple_resource("Partner", "partnerId"),
    }));
    assert_contains(&message, "does not exist in jsonSchemaForInsert");
}
