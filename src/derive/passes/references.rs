//! Reference binding: turns every document reference mapping into a document
//! FK column plus stored projections of the referenced identity values.

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::resource::columns::resolve_scalar_type;
use crate::derive::resource::extract::{DocumentPathKind, ResourceInputs};
use crate::derive::resource::{ordering, resolve_schema_path};
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::QualifiedResourceName;
use crate::model::resource::{DocumentReferenceBinding, ReferenceIdentityBinding};
use crate::naming;
use crate::path::JsonPathExpression;

pub struct ReferenceBindingPass;

impl RelationalModelSetPass for ReferenceBindingPass {
    fn name(&self) -> &'static str {
        "reference-binding"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let resources: Vec<QualifiedResourceName> = context
            .inputs_by_resource
            .values()
            .filter(|inputs| !inputs.is_descriptor)
            .map(|inputs| inputs.resource.clone())
            .collect();

        let mut bound = 0usize;
        for resource in &resources {
            let inputs = context
                .inputs_by_resource
                .get(resource)
                .cloned()
                .ok_or_else(|| {
                    DerivationError::resolution(format!("missing inputs for resource {resource}"))
                })?;
            bound += bind_resource_references(context, &inputs)?;
        }

        debug!(pass = self.name(), references = bound, "bound document references");
        Ok(())
    }
}

fn bind_resource_references(
    context: &mut RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<usize, DerivationError> {
    // Resource extensions bind into their base resource's model.
    let model_resource = context.model_resource_for(&inputs.resource);
    let mut bound = 0usize;

    for mapping in &inputs.document_paths {
        let DocumentPathKind::Reference {
            target,
            reference_object_path,
            reference_json_paths,
        } = &mapping.kind
        else {
            continue;
        };

        validate_reference_target(context, inputs, target)?;

        let base = inputs
            .name_overrides
            .get(reference_object_path.canonical())
            .cloned()
            .unwrap_or_else(|| naming::to_pascal_case(&mapping.logical_name));
        let fk_column = naming::reference_document_id_column(&base);
        let is_nullable = !mapping.is_required;

        // Resolve projected identity column types against the insert schema
        // before mutating the model.
        let mut projected = Vec::new();
        for pair in reference_json_paths {
            let relative = reference_object_path
                .relative_segments(&pair.reference_json_path)
                .unwrap_or_default();
            let part_base = inputs
                .name_overrides
                .get(pair.reference_json_path.canonical())
                .cloned()
                .unwrap_or_else(|| naming::column_base_for_segments(relative));
            let column = naming::reference_identity_column(&base, &part_base);

            let leaf = resolve_schema_path(
                &inputs.json_schema_for_insert,
                &pair.reference_json_path,
            )
            .and_then(|node| node.as_object())
            .ok_or_else(|| {
                DerivationError::mapping(format!(
                    "referenceJsonPath '{}' does not exist in jsonSchemaForInsert for resource {}",
                    pair.reference_json_path.canonical(),
                    inputs.resource
                ))
            })?;
            let scalar_type = resolve_scalar_type(
                leaf,
                &pair.reference_json_path,
                &inputs.decimal_infos,
                &inputs.string_max_length_omission_paths,
            )?;
            projected.push((pair.reference_json_path.clone(), column, scalar_type));
        }

        let entry = context.model_for_mut(&model_resource).ok_or_else(|| {
            DerivationError::resolution(format!("no model found for resource {model_resource}"))
        })?;

        let table_name = {
            let owning = owning_table_scope(entry, reference_object_path).ok_or_else(|| {
                DerivationError::mapping(format!(
                    "reference '{}' at {} on resource {} is not under any table scope",
                    mapping.logical_name,
                    reference_object_path.canonical(),
                    inputs.resource
                ))
            })?;
            owning.clone()
        };

        let table = entry
            .model
            .table_by_name_mut(&table_name)
            .ok_or_else(|| {
                DerivationError::resolution(format!("no table named {table_name} on {model_resource}"))
            })?;

        push_reference_column(
            inputs,
            table,
            DbColumnModel {
                name: fk_column.clone(),
                kind: ColumnKind::DocumentFk,
                scalar_type: Some(RelationalScalarType::Int64),
                is_nullable,
                source_json_path: Some(reference_object_path.clone()),
                target_resource: Some(target.clone()),
                storage: ColumnStorage::Stored,
            },
        )?;

        let mut identity_bindings = Vec::new();
        for (source_json_path, column, scalar_type) in projected {
            push_reference_column(
                inputs,
                table,
                DbColumnModel {
                    name: column.clone(),
                    kind: ColumnKind::Scalar,
                    scalar_type: Some(scalar_type),
                    is_nullable,
                    source_json_path: Some(source_json_path.clone()),
                    target_resource: None,
                    storage: ColumnStorage::Stored,
                },
            )?;
            identity_bindings.push(ReferenceIdentityBinding {
                source_json_path,
                column,
            });
        }

        ordering::canonicalize_table(table);

        entry
            .model
            .document_reference_bindings
            .push(DocumentReferenceBinding {
                reference_object_path: reference_object_path.clone(),
                table: table_name,
                fk_column,
                target_resource: target.clone(),
                is_identity_component: mapping.is_part_of_identity,
                is_required: mapping.is_required,
                identity_bindings,
            });
        bound += 1;
    }

    Ok(bound)
}

/// The table whose scope is the longest prefix of the reference object path.
fn owning_table_scope<'a>(
    entry: &'a crate::model::resource::ConcreteResourceModel,
    reference_object_path: &JsonPathExpression,
) -> Option<&'a crate::model::names::DbTableName> {
    entry
        .model
        .tables
        .iter()
        .filter(|table| table.json_scope.is_prefix_of(reference_object_path))
        .max_by_key(|table| table.json_scope.segments().len())
        .map(|table| &table.table)
}

fn validate_reference_target(
    context: &RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
    target: &QualifiedResourceName,
) -> Result<(), DerivationError> {
    if context.is_abstract_resource(target) || context.model_for(target).is_some() {
        return Ok(());
    }
    Err(DerivationError::resolution(format!(
        "reference target {target} on resource {} is not part of the effective schema set",
        inputs.resource
    )))
}

fn push_reference_column(
    inputs: &ResourceInputs,
    table: &mut crate::model::table::DbTableModel,
    column: DbColumnModel,
) -> Result<(), DerivationError> {
    if let Some(existing) = table.column(&column.name) {
        // Re-binding the same path is a duplicate mapping, not a collision.
        let existing_path = existing
            .source_json_path
            .as_ref()
            .map(|path| path.canonical().to_string())
            .unwrap_or_else(|| "<key part>".to_string());
        let new_path = column
            .source_json_path
            .as_ref()
            .map(|path| path.canonical().to_string())
            .unwrap_or_default();
        return Err(DerivationError::mapping(format!(
            "column name '{}' on table '{}' is derived for both '{existing_path}' and '{new_path}' on resource {}; use relational.nameOverrides to disambiguate",
            column.name, table.table, inputs.resource
        )));
    }
    table.columns.push(column);
    Ok(())
}
