//! Unit tests for effective schema set assembly.

use pretty_assertions::assert_eq;
use serde_json::json;

use relmodel::EffectiveSchemaSet;

use crate::common::{project, project_with_abstracts, simple_resource};

// ============================================================================
// Project Ordering Tests
// ============================================================================

#[test]
fn test_projects_sorted_by_endpoint_name() {
    let set = EffectiveSchemaSet::assemble(vec![
        project("Sample", "sample", true, json!({})),
        project("Ed-Fi", "ed-fi", false, json!({})),
    ])
    .unwrap();

    let endpoints: Vec<&str> = set
        .projects_in_endpoint_order
        .iter()
        .map(|project| project.endpoint_name.as_str())
        .collect();
    assert_eq!(endpoints, vec!["ed-fi", "sample"]);
}

#[test]
fn test_empty_set_is_rejected() {
    let err = EffectiveSchemaSet::assemble(vec![]).unwrap_err();
    assert!(err.to_string().contains("at least one project"));
}

#[test]
fn test_duplicate_endpoint_name_is_rejected() {
    let err = EffectiveSchemaSet::assemble(vec![
        project("Ed-Fi", "ed-fi", false, json!({})),
        project("Ed-Fi-Too", "ed-fi", false, json!({})),
    ])
    .unwrap_err();
    assert!(err
        .to_string()
        .contains("duplicate project endpoint name 'ed-fi'"));
}

// ============================================================================
// Resource Key Table Tests
// ============================================================================

#[test]
fn test_resource_keys_assigned_abstracts_first_then_concrete() {
    let set = EffectiveSchemaSet::assemble(vec![project_with_abstracts(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "EducationOrganization": {"identityJsonPaths": ["$.educationOrganizationId"]}
        }),
        json!({
            "students": simple_resource("Student", "studentUniqueId"),
            "schools": simple_resource("School", "schoolId"),
        }),
    )])
    .unwrap();

    let keys: Vec<(u32, String, bool)> = set
        .info
        .resource_keys_in_id_order
        .iter()
        .map(|entry| (entry.id, entry.resource.to_string(), entry.is_abstract))
        .collect();
    assert_eq!(
        keys,
        vec![
            (1, "Ed-Fi:EducationOrganization".to_string(), true),
            (2, "Ed-Fi:School".to_string(), false),
            (3, "Ed-Fi:Student".to_string(), false),
        ]
    );
}

#[test]
fn test_resource_extensions_get_no_key() {
    let set = EffectiveSchemaSet::assemble(vec![
        project("Ed-Fi", "ed-fi", false, json!({
            "schools": simple_resource("School", "schoolId"),
        })),
        project("Sample", "sample", true, json!({
            "schools": {
                "resourceName": "School",
                "isResourceExtension": true,
                "jsonSchemaForInsert": {"type": "object", "properties": {}}
            }
        })),
    ])
    .unwrap();

    assert_eq!(set.info.resource_keys_in_id_order.len(), 1);
    assert_eq!(
        set.info.resource_keys_in_id_order[0].resource.to_string(),
        "Ed-Fi:School"
    );
}

#[test]
fn test_duplicate_resource_in_one_project_is_rejected() {
    let err = EffectiveSchemaSet::assemble(vec![project(
        "Ed-Fi",
        "ed-fi",
        false,
        json!({
            "schools": simple_resource("School", "schoolId"),
            "schoolsAgain": simple_resource("School", "schoolId"),
        }),
    )])
    .unwrap_err();
    assert!(err
        .to_string()
        .contains("declares resource 'School' more than once"));
}

// ============================================================================
// Format Version and Content Hash Tests
// ============================================================================

#[test]
fn test_format_version_comes_from_the_core_project() {
    let set = EffectiveSchemaSet::assemble(vec![
        project("Ed-Fi", "ed-fi", false, json!({})),
        project("Sample", "sample", true, json!({})),
    ])
    .unwrap();
    assert_eq!(set.info.format_version, "1.0");
}

#[test]
fn test_content_hash_ignores_project_input_order() {
    let forward = EffectiveSchemaSet::assemble(vec![
        project("Ed-Fi", "ed-fi", false, json!({})),
        project("Sample", "sample", true, json!({})),
    ])
    .unwrap();
    let reversed = EffectiveSchemaSet::assemble(vec![
        project("Sample", "sample", true, json!({})),
        project("Ed-Fi", "ed-fi", false, json!({})),
    ])
    .unwrap();
    assert_eq!(forward.info.content_hash, reversed.info.content_hash);
    assert_eq!(forward.info.content_hash.len(), 64);
}

// ============================================================================
// Document Consistency Tests
// ============================================================================

#[test]
fn test_mismatched_project_name_is_rejected() {
    let mut bad = project("Ed-Fi", "ed-fi", false, json!({}));
    bad.project_name = "Something-Else".to_string();
    let err = EffectiveSchemaSet::assemble(vec![bad]).unwrap_err();
    assert!(err.to_string().contains("does not match supplied project name"));
}

#[test]
fn test_mismatched_extension_flag_is_rejected() {
    let mut bad = project("Ed-Fi", "ed-fi", false, json!({}));
    bad.is_extension = true;
    let err = EffectiveSchemaSet::assemble(vec![bad]).unwrap_err();
    assert!(err.to_string().contains("isExtensionProject mismatch"));
}
