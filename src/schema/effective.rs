//! Effective schema set assembly.
//!
//! An effective schema set is the ordered collection of project schema
//! documents a deployment serves: the core project plus any extension
//! projects. Assembly validates document/record consistency, fixes the
//! project order (endpoint name), assigns the deterministic resource-key
//! table, and computes a content hash over the raw documents so downstream
//! storage can detect schema drift.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::DerivationError;
use crate::model::names::QualifiedResourceName;
use crate::schema::raw;

/// One project schema document plus its placement metadata.
#[derive(Debug, Clone)]
pub struct EffectiveProjectSchema {
    pub endpoint_name: String,
    pub project_name: String,
    pub project_version: String,
    pub is_extension: bool,
    /// The raw project schema document (root object contains `projectSchema`).
    pub api_schema: Value,
}

impl EffectiveProjectSchema {
    /// The `projectSchema` object inside the document.
    pub fn project_schema(&self) -> Result<&Map<String, Value>, DerivationError> {
        let root = raw::require_object(&self.api_schema, "api schema document")?;
        let node = raw::require_member(root, "projectSchema", "api schema document")?;
        raw::require_object(node, "projectSchema")
    }
}

/// One row of the deterministic resource-key table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceKeyEntry {
    /// Sequential id, assigned from 1 in key-table order.
    pub id: u32,
    pub resource: QualifiedResourceName,
    pub version: String,
    pub is_abstract: bool,
}

/// Derived metadata for an assembled schema set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveSchemaInfo {
    pub format_version: String,
    /// SHA-256 over the canonical project documents, in endpoint order.
    pub content_hash: String,
    pub resource_keys_in_id_order: Vec<ResourceKeyEntry>,
}

/// An assembled, validated schema set ready for derivation.
#[derive(Debug, Clone)]
pub struct EffectiveSchemaSet {
    pub projects_in_endpoint_order: Vec<EffectiveProjectSchema>,
    pub info: EffectiveSchemaInfo,
}

impl EffectiveSchemaSet {
    /// Assembles a schema set: orders projects by endpoint name, validates
    /// document consistency, assigns resource keys, and hashes the content.
    ///
    /// Resource ids are assigned deterministically: projects in endpoint-name
    /// order; within each project the abstract resources in name order, then
    /// the concrete resources in name order; ids sequential from 1. Resource
    /// extensions do not form resources of their own and receive no key.
    pub fn assemble(
        mut projects: Vec<EffectiveProjectSchema>,
    ) -> Result<Self, DerivationError> {
        if projects.is_empty() {
            return Err(DerivationError::schema_shape(
                "effective schema set must contain at least one project",
            ));
        }

        projects.sort_by(|a, b| a.endpoint_name.cmp(&b.endpoint_name));

        for pair in projects.windows(2) {
            if pair[0].endpoint_name == pair[1].endpoint_name {
                return Err(DerivationError::schema_shape(format!(
                    "duplicate project endpoint name '{}'",
                    pair[0].endpoint_name
                )));
            }
        }

        let mut resource_keys = Vec::new();
        let mut next_id: u32 = 1;
        let mut hasher = Sha256::new();
        let mut format_version = String::from("unversioned");

        for project in &projects {
            let project_schema = project.project_schema()?;
            validate_project_consistency(project, project_schema)?;

            if let Some(version) =
                raw::optional_str(project_schema, "apiSchemaFormatVersion", "projectSchema")?
            {
                if !project.is_extension {
                    format_version = version.to_string();
                }
            }

            hasher.update(project.endpoint_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(canonical_document_text(&project.api_schema).as_bytes());
            hasher.update([0u8]);

            // Abstract resources first, then concrete; maps iterate key-sorted.
            if let Some(abstracts) =
                raw::optional_object(project_schema, "abstractResources", "projectSchema")?
            {
                for name in abstracts.keys() {
                    resource_keys.push(ResourceKeyEntry {
                        id: next_id,
                        resource: QualifiedResourceName::new(&project.project_name, name),
                        version: project.project_version.clone(),
                        is_abstract: true,
                    });
                    next_id += 1;
                }
            }

            let resource_schemas = raw::require_member(
                project_schema,
                "resourceSchemas",
                "projectSchema",
            )
            .and_then(|node| raw::require_object(node, "projectSchema.resourceSchemas"))?;

            let mut concrete_names = Vec::new();
            for (endpoint, resource_schema) in resource_schemas {
                let what = format!("resourceSchemas.{endpoint}");
                let resource_schema = raw::require_object(resource_schema, &what)?;
                if raw::optional_bool(resource_schema, "isResourceExtension", false, &what)? {
                    continue;
                }
                let resource_name = raw::require_str(resource_schema, "resourceName", &what)?;
                concrete_names.push(resource_name.to_string());
            }
            concrete_names.sort();

            for pair in concrete_names.windows(2) {
                if pair[0] == pair[1] {
                    return Err(DerivationError::schema_shape(format!(
                        "project '{}' declares resource '{}' more than once",
                        project.project_name, pair[0]
                    )));
                }
            }

            for name in concrete_names {
                resource_keys.push(ResourceKeyEntry {
                    id: next_id,
                    resource: QualifiedResourceName::new(&project.project_name, name),
                    version: project.project_version.clone(),
                    is_abstract: false,
                });
                next_id += 1;
            }
        }

        let content_hash = hex::encode(hasher.finalize());

        Ok(EffectiveSchemaSet {
            projects_in_endpoint_order: projects,
            info: EffectiveSchemaInfo {
                format_version,
                content_hash,
                resource_keys_in_id_order: resource_keys,
            },
        })
    }

    pub fn resource_key(&self, resource: &QualifiedResourceName) -> Option<&ResourceKeyEntry> {
        self.info
            .resource_keys_in_id_order
            .iter()
            .find(|entry| &entry.resource == resource)
    }
}

fn validate_project_consistency(
    project: &EffectiveProjectSchema,
    project_schema: &Map<String, Value>,
) -> Result<(), DerivationError> {
    let declared_name = raw::require_str(project_schema, "projectName", "projectSchema")?;
    if declared_name != project.project_name {
        return Err(DerivationError::schema_shape(format!(
            "projectSchema.projectName '{declared_name}' does not match supplied project name '{}'",
            project.project_name
        )));
    }

    let declared_endpoint =
        raw::require_str(project_schema, "projectEndpointName", "projectSchema")?;
    if declared_endpoint != project.endpoint_name {
        return Err(DerivationError::schema_shape(format!(
            "projectSchema.projectEndpointName '{declared_endpoint}' does not match supplied endpoint name '{}'",
            project.endpoint_name
        )));
    }

    let declared_extension =
        raw::optional_bool(project_schema, "isExtensionProject", false, "projectSchema")?;
    if declared_extension != project.is_extension {
        return Err(DerivationError::schema_shape(format!(
            "projectSchema.isExtensionProject mismatch for project '{}'",
            project.project_name
        )));
    }

    Ok(())
}

/// Canonical text of a document: serde_json's default map is key-sorted, so
/// serialization is independent of the input's member order.
fn canonical_document_text(document: &Value) -> String {
    document.to_string()
}
