//! Base traversal: runs the per-resource pipeline for every concrete,
//! non-descriptor, non-extension resource.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::resource::columns::{self, ColumnDeriveParams, DescriptorPathInfo};
use crate::derive::resource::extension_sites::discover_extension_sites;
use crate::derive::resource::extract::{DocumentPathKind, ResourceInputs};
use crate::derive::resource::scopes::{derive_table_tree, TableTreeParams};
use crate::derive::resource::{ordering, validate};
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::ColumnKind;
use crate::model::names::{DbColumnName, DbSchemaName, DbTableName};
use crate::model::resource::{ConcreteResourceModel, RelationalResourceModel, ResourceStorageKind};
use crate::model::table::{DbKeyColumn, TableKey};
use crate::naming;
use crate::path::JsonPathExpression;

pub struct BaseResourceDerivationPass;

impl RelationalModelSetPass for BaseResourceDerivationPass {
    fn name(&self) -> &'static str {
        "base-resource-derivation"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        // Discover extension sites up front for every resource; the extension
        // pass consumes the sites of resource extensions later.
        let mut sites_by_resource = BTreeMap::new();
        for (resource, inputs) in &context.inputs_by_resource {
            if inputs.is_descriptor {
                continue;
            }
            sites_by_resource.insert(resource.clone(), discover_extension_sites(inputs)?);
        }
        for (resource, sites) in sites_by_resource {
            if let Some(inputs) = context.inputs_by_resource.get_mut(&resource) {
                inputs.extension_sites = sites;
            }
        }

        // Per-resource derivation is independent; only this step runs in
        // parallel.
        let derived: Vec<Result<ConcreteResourceModel, DerivationError>> = {
            let context_ref: &RelationalModelSetBuilderContext = context;
            let eligible: Vec<&ResourceInputs> = context_ref
                .inputs_by_resource
                .values()
                .filter(|inputs| !inputs.is_descriptor && !inputs.is_resource_extension)
                .collect();
            eligible
                .par_iter()
                .map(|inputs| derive_resource(context_ref, inputs))
                .collect()
        };

        for model in derived {
            context.resources.push(model?);
        }

        debug!(
            pass = self.name(),
            resources = context.resources.len(),
            "derived base resource models"
        );
        Ok(())
    }
}

fn derive_resource(
    context: &RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<ConcreteResourceModel, DerivationError> {
    validate::validate_insert_schema(inputs)?;

    let resource_key = context.resource_key(&inputs.resource)?;
    let physical_schema = context.physical_schema_for_project(&inputs.resource.project_name)?;
    let descriptor_paths = context
        .descriptor_paths_by_resource
        .get(&inputs.resource)
        .cloned()
        .unwrap_or_default();

    let model = derive_relational_tables(inputs, physical_schema, &descriptor_paths)?;

    Ok(ConcreteResourceModel {
        resource_key,
        model,
    })
}

/// Steps 4 through 6 for one resource rooted at `$`.
pub(crate) fn derive_relational_tables(
    inputs: &ResourceInputs,
    physical_schema: DbSchemaName,
    descriptor_paths: &BTreeMap<String, DescriptorPathInfo>,
) -> Result<RelationalResourceModel, DerivationError> {
    let root_base = naming::to_pascal_case(&inputs.resource.resource_name);
    let root_table = DbTableName::new(physical_schema.clone(), &root_base);
    let root_key = TableKey {
        name: naming::primary_key_name(&root_table),
        columns: vec![DbKeyColumn {
            name: DbColumnName::new(naming::DOCUMENT_ID),
            kind: ColumnKind::ParentKeyPart,
        }],
    };

    let skip_paths = reference_object_paths(inputs);
    let identity_paths: BTreeSet<String> = inputs
        .identity_json_paths
        .iter()
        .map(|path| path.canonical().to_string())
        .collect();

    let mut tables = derive_table_tree(&TableTreeParams {
        resource: &inputs.resource,
        schema: &inputs.json_schema_for_insert,
        root_scope: JsonPathExpression::root(),
        root_table,
        root_table_base: root_base.clone(),
        document_id_base: root_base,
        root_key,
        root_constraints: Vec::new(),
        skip_paths: &skip_paths,
        root_collection_base: None,
    })?;

    let descriptor_edges = columns::derive_columns(
        &ColumnDeriveParams {
            inputs,
            schema: &inputs.json_schema_for_insert,
            root_scope: JsonPathExpression::root(),
            descriptor_paths,
            skip_paths: &skip_paths,
            identity_paths: &identity_paths,
        },
        &mut tables,
    )?;

    let mut model = RelationalResourceModel {
        resource: inputs.resource.clone(),
        physical_schema,
        storage_kind: ResourceStorageKind::RelationalTables,
        tables,
        document_reference_bindings: Vec::new(),
        descriptor_edge_sources: descriptor_edges,
        key_unification_classes: Vec::new(),
        key_unification_equality_constraints: Vec::new(),
        allow_identity_updates: inputs.allow_identity_updates,
    };
    ordering::canonicalize_model(&mut model);
    Ok(model)
}

/// Canonical reference object paths, excluded from scalar flattening.
pub(crate) fn reference_object_paths(inputs: &ResourceInputs) -> BTreeSet<String> {
    inputs
        .document_paths
        .iter()
        .filter_map(|mapping| match &mapping.kind {
            DocumentPathKind::Reference {
                reference_object_path,
                ..
            } => Some(reference_object_path.canonical().to_string()),
            _ => None,
        })
        .collect()
}
