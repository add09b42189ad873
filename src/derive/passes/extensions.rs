//! Extension table derivation: attaches `_ext` subtrees of resource
//! extensions to the base resource's tables, in the extension project's
//! physical schema.

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::passes::base::reference_object_paths;
use crate::derive::resource::columns::{self, ColumnDeriveParams};
use crate::derive::resource::extract::{ExtensionSite, ResourceInputs};
use crate::derive::resource::scopes::{derive_table_tree, TableTreeParams};
use crate::derive::resource::{ordering, resolve_schema_path, validate};
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::ColumnKind;
use crate::model::names::{DbTableName, QualifiedResourceName};
use crate::model::resource::ResourceStorageKind;
use crate::model::table::{DbKeyColumn, ReferentialAction, TableConstraint, TableKey};
use crate::naming;
use crate::path::JsonPathSegment;

pub struct ExtensionTableDerivationPass;

impl RelationalModelSetPass for ExtensionTableDerivationPass {
    fn name(&self) -> &'static str {
        "extension-table-derivation"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let extension_resources: Vec<QualifiedResourceName> = context
            .inputs_by_resource
            .values()
            .filter(|inputs| inputs.is_resource_extension)
            .map(|inputs| inputs.resource.clone())
            .collect();

        for resource in &extension_resources {
            // The inputs are cloned so the base model can be mutated while
            // they are walked.
            let inputs = context
                .inputs_by_resource
                .get(resource)
                .cloned()
                .ok_or_else(|| {
                    DerivationError::resolution(format!("missing inputs for resource {resource}"))
                })?;
            validate::validate_insert_schema(&inputs)?;

            let base_resource = resolve_base_resource(context, &inputs)?;
            context
                .extension_base_by_resource
                .insert(resource.clone(), base_resource.clone());

            for site in &inputs.extension_sites {
                derive_site_tables(context, &inputs, &base_resource, site)?;
            }
        }

        debug!(
            pass = self.name(),
            extensions = extension_resources.len(),
            "derived extension tables"
        );
        Ok(())
    }
}

/// A resource extension attaches to the one concrete resource of the same
/// name in another project.
fn resolve_base_resource(
    context: &RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<QualifiedResourceName, DerivationError> {
    let mut candidates: Vec<QualifiedResourceName> = context
        .resources
        .iter()
        .filter(|entry| {
            entry.model.storage_kind == ResourceStorageKind::RelationalTables
                && entry.resource_key.resource.resource_name == inputs.resource.resource_name
                && entry.resource_key.resource.project_name != inputs.resource.project_name
        })
        .map(|entry| entry.resource_key.resource.clone())
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(DerivationError::resolution(format!(
            "resource extension {} does not match any concrete resource named '{}'",
            inputs.resource, inputs.resource.resource_name
        ))),
        1 => Ok(candidates.remove(0)),
        _ => Err(DerivationError::resolution(format!(
            "resource extension {} matches multiple concrete resources: {}",
            inputs.resource,
            candidates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn derive_site_tables(
    context: &mut RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
    base_resource: &QualifiedResourceName,
    site: &ExtensionSite,
) -> Result<(), DerivationError> {
    for project_key in &site.project_keys {
        let extension_schema = resolve_extension_project_schema(context, inputs, site, project_key)?;

        let base_model = context.model_for(base_resource).ok_or_else(|| {
            DerivationError::resolution(format!(
                "no model found for base resource {base_resource}"
            ))
        })?;
        let owning_table = base_model
            .model
            .table_by_scope(&site.owning_scope)
            .ok_or_else(|| {
                DerivationError::resolution(format!(
                    "extension site at {} on resource {} has no owning table scope in base resource {base_resource}",
                    site.extension_path.canonical(),
                    inputs.resource
                ))
            })?;

        let ext_scope = site.extension_path.child_property(project_key);
        let subtree =
            resolve_schema_path(&inputs.json_schema_for_insert, &ext_scope).ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "extension subtree at {} does not exist in jsonSchemaForInsert for resource {}",
                    ext_scope.canonical(),
                    inputs.resource
                ))
            })?;

        let ext_base = format!("{}Extension", owning_table.table.name());
        let ext_table = DbTableName::new(extension_schema, &ext_base);

        // The extension row is 1:1 with its owning row: same key, cascading
        // FK back to the owning table.
        let key_columns: Vec<DbKeyColumn> = owning_table
            .key
            .columns
            .iter()
            .map(|part| DbKeyColumn {
                name: part.name.clone(),
                kind: ColumnKind::ParentKeyPart,
            })
            .collect();
        let root_key = TableKey {
            name: naming::primary_key_name(&ext_table),
            columns: key_columns,
        };
        let owning_fk = TableConstraint::ForeignKey {
            name: naming::foreign_key_name(&ext_table, &[owning_table.table.name().to_string()]),
            columns: root_key.column_names(),
            target_table: owning_table.table.clone(),
            target_columns: owning_table.key.column_names(),
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        };

        let root_base_token = naming::to_pascal_case(&base_resource.resource_name);
        let skip_paths = reference_object_paths(inputs);
        let identity_paths = std::collections::BTreeSet::new();

        // A site below the root sits in an array scope; nested collections
        // rename the inherited ordinal through that scope's collection base.
        let root_collection_base = site
            .owning_scope
            .segments()
            .iter()
            .rev()
            .find_map(|segment| match segment {
                JsonPathSegment::Property(name) => Some(naming::collection_base_name(name)),
                JsonPathSegment::AnyArrayElement => None,
            });

        let mut tables = derive_table_tree(&TableTreeParams {
            resource: &inputs.resource,
            schema: subtree,
            root_scope: ext_scope.clone(),
            root_table: ext_table,
            root_table_base: ext_base,
            document_id_base: root_base_token,
            root_key,
            root_constraints: vec![owning_fk],
            skip_paths: &skip_paths,
            root_collection_base,
        })?;

        let descriptor_paths = context
            .descriptor_paths_by_resource
            .get(&inputs.resource)
            .cloned()
            .unwrap_or_default();

        let mut descriptor_edges = columns::derive_columns(
            &ColumnDeriveParams {
                inputs,
                schema: subtree,
                root_scope: ext_scope,
                descriptor_paths: &descriptor_paths,
                skip_paths: &skip_paths,
                identity_paths: &identity_paths,
            },
            &mut tables,
        )?;

        for table in &mut tables {
            ordering::canonicalize_table(table);
        }

        let base_model = context.model_for_mut(base_resource).ok_or_else(|| {
            DerivationError::resolution(format!(
                "no model found for base resource {base_resource}"
            ))
        })?;
        base_model.model.tables.append(&mut tables);
        base_model
            .model
            .descriptor_edge_sources
            .append(&mut descriptor_edges);
    }
    Ok(())
}

/// Resolves an `_ext` project key to an extension project's physical schema.
/// Endpoint names match first, then project names, case-insensitively.
fn resolve_extension_project_schema(
    context: &RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
    site: &ExtensionSite,
    project_key: &str,
) -> Result<crate::model::names::DbSchemaName, DerivationError> {
    let key_lower = project_key.to_lowercase();

    let by_endpoint: Vec<_> = context
        .projects
        .iter()
        .filter(|project| project.is_extension && project.endpoint_name.to_lowercase() == key_lower)
        .collect();
    let matches = if by_endpoint.is_empty() {
        context
            .projects
            .iter()
            .filter(|project| {
                project.is_extension && project.project_name.to_lowercase() == key_lower
            })
            .collect()
    } else {
        by_endpoint
    };

    match matches.len() {
        0 => Err(DerivationError::resolution(format!(
            "unknown extension project key '{project_key}' at {} on resource {}",
            site.extension_path.canonical(),
            inputs.resource
        ))),
        1 => Ok(matches[0].physical_schema.clone()),
        _ => Err(DerivationError::resolution(format!(
            "extension project key '{project_key}' at {} on resource {} matches multiple extension projects",
            site.extension_path.canonical(),
            inputs.resource
        ))),
    }
}
