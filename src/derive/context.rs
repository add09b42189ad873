//! Shared state for the cross-resource derivation passes.

use std::collections::BTreeMap;

use crate::derive::resource::columns::DescriptorPathInfo;
use crate::derive::resource::extract::{self, DocumentPathKind, ResourceInputs};
use crate::dialect::{SqlDialect, SqlDialectRules};
use crate::error::DerivationError;
use crate::model::abstracts::{AbstractIdentityTableInfo, AbstractUnionViewInfo};
use crate::model::inventory::{DbIndexInfo, DbTriggerInfo};
use crate::model::model_set::{DerivedRelationalModelSet, ProjectSchemaInfo};
use crate::model::names::{DbSchemaName, QualifiedResourceName};
use crate::model::resource::ConcreteResourceModel;
use crate::naming;
use crate::path::JsonPathExpression;
use crate::schema::effective::{EffectiveSchemaSet, ResourceKeyEntry};
use crate::schema::raw;

/// Mutable builder state threaded through the set passes in order. Each pass
/// reads what earlier passes produced and appends its own contribution;
/// `build_result` validates and canonically orders the final model set.
pub struct RelationalModelSetBuilderContext {
    pub(crate) schema_set: EffectiveSchemaSet,
    pub(crate) dialect: SqlDialect,
    pub(crate) projects: Vec<ProjectSchemaInfo>,
    /// Declared identity paths per abstract resource.
    pub(crate) abstract_identity_paths: BTreeMap<QualifiedResourceName, Vec<JsonPathExpression>>,
    /// Extracted inputs for every resource, including descriptors and
    /// resource extensions.
    pub(crate) inputs_by_resource: BTreeMap<QualifiedResourceName, ResourceInputs>,
    /// Descriptor value paths per resource, keyed by canonical path.
    pub(crate) descriptor_paths_by_resource:
        BTreeMap<QualifiedResourceName, BTreeMap<String, DescriptorPathInfo>>,
    /// Resource extension to the base resource its tables attach to. Filled
    /// by the extension pass.
    pub(crate) extension_base_by_resource: BTreeMap<QualifiedResourceName, QualifiedResourceName>,
    /// Models under construction.
    pub(crate) resources: Vec<ConcreteResourceModel>,
    pub(crate) abstract_identity_tables: Vec<AbstractIdentityTableInfo>,
    pub(crate) abstract_union_views: Vec<AbstractUnionViewInfo>,
    pub(crate) indexes: Vec<DbIndexInfo>,
    pub(crate) triggers: Vec<DbTriggerInfo>,
}

impl RelationalModelSetBuilderContext {
    pub fn new(
        schema_set: EffectiveSchemaSet,
        dialect: SqlDialect,
    ) -> Result<Self, DerivationError> {
        let mut projects = Vec::new();
        let mut abstract_identity_paths = BTreeMap::new();
        let mut inputs_by_resource = BTreeMap::new();

        for project in &schema_set.projects_in_endpoint_order {
            projects.push(ProjectSchemaInfo {
                endpoint_name: project.endpoint_name.clone(),
                project_name: project.project_name.clone(),
                project_version: project.project_version.clone(),
                is_extension: project.is_extension,
                physical_schema: naming::normalize_schema_name(&project.endpoint_name),
            });

            let project_schema = project.project_schema()?;

            if let Some(abstracts) =
                raw::optional_object(project_schema, "abstractResources", "projectSchema")?
            {
                for (name, node) in abstracts {
                    let what = format!("abstractResources.{name}");
                    let node = raw::require_object(node, &what)?;
                    let mut identity_paths = Vec::new();
                    if let Some(paths) = raw::optional_array(node, "identityJsonPaths", &what)? {
                        for path in paths {
                            let path = path.as_str().ok_or_else(|| {
                                DerivationError::schema_shape(format!(
                                    "{what}.identityJsonPaths must be strings"
                                ))
                            })?;
                            identity_paths.push(JsonPathExpression::compile(path)?);
                        }
                    }
                    abstract_identity_paths.insert(
                        QualifiedResourceName::new(&project.project_name, name),
                        identity_paths,
                    );
                }
            }

            let resource_schemas =
                raw::require_member(project_schema, "resourceSchemas", "projectSchema").and_then(
                    |node| raw::require_object(node, "projectSchema.resourceSchemas"),
                )?;

            for (endpoint_key, resource_schema) in resource_schemas {
                let inputs = extract::extract_inputs(
                    &project.project_name,
                    &project.endpoint_name,
                    endpoint_key,
                    resource_schema,
                )?;
                if inputs_by_resource
                    .insert(inputs.resource.clone(), inputs)
                    .is_some()
                {
                    return Err(DerivationError::schema_shape(format!(
                        "project '{}' declares resource '{endpoint_key}' more than once",
                        project.project_name
                    )));
                }
            }
        }

        let descriptor_paths_by_resource = inputs_by_resource
            .iter()
            .map(|(resource, inputs)| {
                let paths: BTreeMap<String, DescriptorPathInfo> = inputs
                    .document_paths
                    .iter()
                    .filter_map(|mapping| match &mapping.kind {
                        DocumentPathKind::Descriptor { path, target } => Some((
                            path.canonical().to_string(),
                            DescriptorPathInfo {
                                target: target.clone(),
                                is_part_of_identity: mapping.is_part_of_identity,
                                is_required: mapping.is_required,
                            },
                        )),
                        _ => None,
                    })
                    .collect();
                (resource.clone(), paths)
            })
            .collect();

        Ok(RelationalModelSetBuilderContext {
            schema_set,
            dialect,
            projects,
            abstract_identity_paths,
            inputs_by_resource,
            descriptor_paths_by_resource,
            extension_base_by_resource: BTreeMap::new(),
            resources: Vec::new(),
            abstract_identity_tables: Vec::new(),
            abstract_union_views: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
        })
    }

    pub(crate) fn dialect_rules(&self) -> &'static dyn SqlDialectRules {
        self.dialect.rules()
    }

    pub(crate) fn physical_schema_for_project(
        &self,
        project_name: &str,
    ) -> Result<DbSchemaName, DerivationError> {
        self.projects
            .iter()
            .find(|project| project.project_name == project_name)
            .map(|project| project.physical_schema.clone())
            .ok_or_else(|| {
                DerivationError::resolution(format!(
                    "project '{project_name}' is not part of the effective schema set"
                ))
            })
    }

    pub(crate) fn resource_key(
        &self,
        resource: &QualifiedResourceName,
    ) -> Result<ResourceKeyEntry, DerivationError> {
        self.schema_set
            .resource_key(resource)
            .cloned()
            .ok_or_else(|| {
                DerivationError::resolution(format!(
                    "resource {resource} is not part of the effective schema set"
                ))
            })
    }

    pub(crate) fn is_abstract_resource(&self, resource: &QualifiedResourceName) -> bool {
        self.abstract_identity_paths.contains_key(resource)
    }

    pub(crate) fn model_for(
        &self,
        resource: &QualifiedResourceName,
    ) -> Option<&ConcreteResourceModel> {
        self.resources
            .iter()
            .find(|entry| &entry.resource_key.resource == resource)
    }

    pub(crate) fn model_for_mut(
        &mut self,
        resource: &QualifiedResourceName,
    ) -> Option<&mut ConcreteResourceModel> {
        self.resources
            .iter_mut()
            .find(|entry| &entry.resource_key.resource == resource)
    }

    /// The resource whose model a set of inputs contributes to: the base
    /// resource for resource extensions, the resource itself otherwise.
    pub(crate) fn model_resource_for(
        &self,
        resource: &QualifiedResourceName,
    ) -> QualifiedResourceName {
        self.extension_base_by_resource
            .get(resource)
            .cloned()
            .unwrap_or_else(|| resource.clone())
    }

    /// Validates global name uniqueness and produces the canonically-ordered
    /// result.
    pub fn build_result(mut self) -> Result<DerivedRelationalModelSet, DerivationError> {
        self.resources
            .sort_by(|a, b| a.resource_key.resource.cmp(&b.resource_key.resource));
        self.abstract_identity_tables
            .sort_by(|a, b| a.abstract_resource_key.resource.cmp(&b.abstract_resource_key.resource));
        self.abstract_union_views
            .sort_by(|a, b| a.abstract_resource_key.resource.cmp(&b.abstract_resource_key.resource));
        self.indexes.sort_by(|a, b| {
            (a.table.schema(), a.table.name(), a.name.as_str()).cmp(&(
                b.table.schema(),
                b.table.name(),
                b.name.as_str(),
            ))
        });
        self.triggers.sort_by(|a, b| {
            (a.table.schema(), a.table.name(), a.name.as_str()).cmp(&(
                b.table.schema(),
                b.table.name(),
                b.name.as_str(),
            ))
        });

        self.validate_table_name_uniqueness()?;
        self.validate_inventory_name_uniqueness()?;

        Ok(DerivedRelationalModelSet {
            effective_schema: self.schema_set.info,
            dialect: self.dialect,
            project_schemas_in_endpoint_order: self.projects,
            resources_in_name_order: self.resources,
            abstract_identity_tables_in_name_order: self.abstract_identity_tables,
            abstract_union_views_in_name_order: self.abstract_union_views,
            indexes_in_create_order: self.indexes,
            triggers_in_create_order: self.triggers,
        })
    }

    /// Tables, identity tables, and views must be unique per physical schema
    /// across the whole set (the shared descriptor table excepted, which
    /// every descriptor resource maps onto).
    fn validate_table_name_uniqueness(&self) -> Result<(), DerivationError> {
        let mut owners: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

        for entry in &self.resources {
            for table in &entry.model.tables {
                if table.table.schema().as_str() == naming::DESCRIPTOR_SCHEMA {
                    continue;
                }
                owners
                    .entry((
                        table.table.schema().as_str().to_string(),
                        table.table.name().to_string(),
                    ))
                    .or_default()
                    .push(entry.resource_key.resource.to_string());
            }
        }
        for info in &self.abstract_identity_tables {
            owners
                .entry((
                    info.table.table.schema().as_str().to_string(),
                    info.table.table.name().to_string(),
                ))
                .or_default()
                .push(info.abstract_resource_key.resource.to_string());
        }
        for view in &self.abstract_union_views {
            owners
                .entry((
                    view.view.schema().as_str().to_string(),
                    view.view.name().to_string(),
                ))
                .or_default()
                .push(view.abstract_resource_key.resource.to_string());
        }

        for ((schema, table), mut names) in owners {
            if names.len() > 1 {
                names.sort();
                return Err(DerivationError::collision(format!(
                    "table name '{schema}.{table}' is derived by multiple resources: {}",
                    names.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn validate_inventory_name_uniqueness(&self) -> Result<(), DerivationError> {
        let mut index_tables: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for index in &self.indexes {
            index_tables
                .entry((
                    index.table.schema().as_str().to_string(),
                    index.name.as_str().to_string(),
                ))
                .or_default()
                .push(index.table.to_string());
        }
        for ((schema, name), mut tables) in index_tables {
            if tables.len() > 1 {
                tables.sort();
                return Err(DerivationError::collision(format!(
                    "index name '{name}' in schema '{schema}' is derived for multiple tables: {}",
                    tables.join(", ")
                )));
            }
        }

        let mut trigger_tables: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for trigger in &self.triggers {
            trigger_tables
                .entry((
                    trigger.table.schema().as_str().to_string(),
                    trigger.name.as_str().to_string(),
                ))
                .or_default()
                .push(trigger.table.to_string());
        }
        for ((schema, name), mut tables) in trigger_tables {
            if tables.len() > 1 {
                tables.sort();
                return Err(DerivationError::collision(format!(
                    "trigger name '{name}' in schema '{schema}' is derived for multiple tables: {}",
                    tables.join(", ")
                )));
            }
        }
        Ok(())
    }
}
