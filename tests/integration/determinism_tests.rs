//! Integration tests for derivation determinism and canonical output
//! ordering.

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{
    core_project, derive, descriptor_schema, project, school_schema, simple_resource,
};

fn mixed_set() -> Vec<relmodel::EffectiveProjectSchema> {
    vec![
        core_project(json!({
            "schools": school_schema(),
            "gradeLevelDescriptors": descriptor_schema("GradeLevelDescriptor"),
            "students": simple_resource("Student", "studentUniqueId"),
        })),
        project(
            "Sample",
            "sample",
            true,
            json!({
                "busRoutes": simple_resource("BusRoute", "busRouteId"),
            }),
        ),
    ]
}

// ============================================================================
// Determinism Tests
// ============================================================================

#[test]
fn test_same_input_derives_identical_model_sets() {
    let first = derive(mixed_set());
    let second = derive(mixed_set());
    assert_eq!(first, second);
}

#[test]
fn test_project_input_order_does_not_matter() {
    let forward = derive(mixed_set());
    let mut reversed_projects = mixed_set();
    reversed_projects.reverse();
    let reversed = derive(reversed_projects);
    assert_eq!(forward, reversed);
}

#[test]
fn test_serialized_model_sets_are_byte_equal() {
    let first = serde_json::to_string(&derive(mixed_set())).unwrap();
    let second = serde_json::to_string(&derive(mixed_set())).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Canonical Ordering Tests
// ============================================================================

#[test]
fn test_resources_ordered_by_project_then_name() {
    let set = derive(mixed_set());

    let names: Vec<String> = set
        .resources_in_name_order
        .iter()
        .map(|entry| entry.resource_key.resource.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "Ed-Fi:GradeLevelDescriptor",
            "Ed-Fi:School",
            "Ed-Fi:Student",
            "Sample:BusRoute",
        ]
    );
}

#[test]
fn test_project_schemas_ordered_by_endpoint() {
    let set = derive(mixed_set());

    let endpoints: Vec<&str> = set
        .project_schemas_in_endpoint_order
        .iter()
        .map(|project| project.endpoint_name.as_str())
        .collect();
    assert_eq!(endpoints, vec!["ed-fi", "sample"]);

    let core = &set.project_schemas_in_endpoint_order[0];
    assert_eq!(core.project_name, "Ed-Fi");
    assert_eq!(core.physical_schema.as_str(), "edfi");
    assert!(!core.is_extension);
}

#[test]
fn test_indexes_ordered_by_schema_table_then_name() {
    let set = derive(mixed_set());

    let keys: Vec<(String, String)> = set
        .indexes_in_create_order
        .iter()
        .map(|index| (index.table.to_string(), index.name.as_str().to_string()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
