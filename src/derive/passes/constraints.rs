//! Constraint derivation: root identity uniqueness, array uniqueness, and
//! reference FK constraints with their all-or-none companions.

use std::collections::BTreeMap;

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::resource::extract::{ArrayUniquenessConstraint, ResourceInputs};
use crate::derive::resource::ordering;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::ColumnKind;
use crate::model::names::{DbColumnName, DbTableName, QualifiedResourceName};
use crate::model::resource::{
    DocumentReferenceBinding, RelationalResourceModel, ResourceStorageKind,
};
use crate::model::table::{DbTableModel, ReferentialAction, TableConstraint};
use crate::naming;
use crate::path::JsonPathExpression;

pub struct ConstraintDerivationPass;

impl RelationalModelSetPass for ConstraintDerivationPass {
    fn name(&self) -> &'static str {
        "constraint-derivation"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let resources: Vec<QualifiedResourceName> = context
            .inputs_by_resource
            .values()
            .filter(|inputs| !inputs.is_descriptor)
            .map(|inputs| inputs.resource.clone())
            .collect();

        for resource in &resources {
            let inputs = context
                .inputs_by_resource
                .get(resource)
                .cloned()
                .ok_or_else(|| {
                    DerivationError::resolution(format!("missing inputs for resource {resource}"))
                })?;
            if !inputs.is_resource_extension {
                derive_root_identity_uniqueness(context, &inputs)?;
            }
            derive_array_uniqueness(context, &inputs)?;
        }

        derive_reference_foreign_keys(context)?;

        for entry in &mut context.resources {
            if entry.model.storage_kind == ResourceStorageKind::RelationalTables {
                for table in &mut entry.model.tables {
                    ordering::canonicalize_table(table);
                }
            }
        }

        debug!(pass = self.name(), "derived table constraints");
        Ok(())
    }
}

/// Unique constraint over the root table's identity columns, in identity
/// declaration order. Identity paths under a reference object contribute the
/// reference's FK column.
fn derive_root_identity_uniqueness(
    context: &mut RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<(), DerivationError> {
    if inputs.identity_json_paths.is_empty() {
        return Ok(());
    }
    let entry = context.model_for_mut(&inputs.resource).ok_or_else(|| {
        DerivationError::resolution(format!("no model found for resource {}", inputs.resource))
    })?;

    let columns = root_identity_columns(&entry.model, &inputs.identity_json_paths)?;
    let root = entry.model.root_table_mut();
    root.constraints.push(TableConstraint::Unique {
        name: naming::unique_name(&root.table, &columns),
        columns,
    });
    Ok(())
}

/// Resolves the root identity columns in identity declaration order: an
/// identity path under a reference object contributes the reference's FK
/// column, any other path its stored root column; duplicates collapse.
pub(crate) fn root_identity_columns(
    model: &RelationalResourceModel,
    identity_json_paths: &[JsonPathExpression],
) -> Result<Vec<DbColumnName>, DerivationError> {
    let root = model.root_table();
    let mut columns: Vec<DbColumnName> = Vec::new();
    for path in identity_json_paths {
        let column = model
            .document_reference_bindings
            .iter()
            .find(|binding| binding.reference_object_path.is_prefix_of(path))
            .map(|binding| binding.fk_column.clone())
            .or_else(|| {
                root.column_by_source_path(path)
                    .map(|column| column.stored_name().clone())
            })
            .ok_or_else(|| {
                DerivationError::mapping(format!(
                    "identity path '{}' on resource {} was not bound to a root table column",
                    path.canonical(),
                    model.resource
                ))
            })?;
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    Ok(columns)
}

fn derive_array_uniqueness(
    context: &mut RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<(), DerivationError> {
    if inputs.array_uniqueness_constraints.is_empty() {
        return Ok(());
    }
    let model_resource = context.model_resource_for(&inputs.resource);
    let entry = context.model_for_mut(&model_resource).ok_or_else(|| {
        DerivationError::resolution(format!("no model found for resource {model_resource}"))
    })?;

    let reference_fks: Vec<(JsonPathExpression, DbColumnName)> = entry
        .model
        .document_reference_bindings
        .iter()
        .map(|binding| (binding.reference_object_path.clone(), binding.fk_column.clone()))
        .collect();

    for constraint in &inputs.array_uniqueness_constraints {
        apply_array_uniqueness(&mut entry.model.tables, inputs, &reference_fks, constraint)?;
    }
    Ok(())
}

fn apply_array_uniqueness(
    tables: &mut [DbTableModel],
    inputs: &ResourceInputs,
    reference_fks: &[(JsonPathExpression, DbColumnName)],
    constraint: &ArrayUniquenessConstraint,
) -> Result<(), DerivationError> {
    if !constraint.paths.is_empty() {
        let table_index = owning_table_index(tables, &constraint.paths).ok_or_else(|| {
            DerivationError::mapping(format!(
                "arrayUniqueness paths on resource {} are not under any table scope",
                inputs.resource
            ))
        })?;

        // Rows are unique within their parent: the parent part of the key
        // (everything before the table's own ordinal) scopes the constraint.
        let mut columns: Vec<DbColumnName> = {
            let table = &tables[table_index];
            let mut key_columns = table.key.columns.clone();
            if matches!(key_columns.last(), Some(part) if part.kind == ColumnKind::Ordinal) {
                key_columns.pop();
            }
            key_columns.into_iter().map(|part| part.name).collect()
        };

        for path in &constraint.paths {
            let column = resolve_uniqueness_column(&tables[table_index], reference_fks, path)
                .ok_or_else(|| {
                    DerivationError::mapping(format!(
                        "arrayUniqueness path '{}' on resource {} was not bound to a column on table '{}'",
                        path.canonical(),
                        inputs.resource,
                        tables[table_index].table
                    ))
                })?;
            if !columns.contains(&column) {
                columns.push(column);
            }
        }

        let table = &mut tables[table_index];
        table.constraints.push(TableConstraint::Unique {
            name: naming::unique_name(&table.table, &columns),
            columns,
        });
    }

    for nested in &constraint.nested {
        apply_array_uniqueness(tables, inputs, reference_fks, nested)?;
    }
    Ok(())
}

/// The table whose scope is the deepest common prefix of every path.
fn owning_table_index(tables: &[DbTableModel], paths: &[JsonPathExpression]) -> Option<usize> {
    tables
        .iter()
        .enumerate()
        .filter(|(_, table)| paths.iter().all(|path| table.json_scope.is_prefix_of(path)))
        .max_by_key(|(_, table)| table.json_scope.segments().len())
        .map(|(index, _)| index)
}

fn resolve_uniqueness_column(
    table: &DbTableModel,
    reference_fks: &[(JsonPathExpression, DbColumnName)],
    path: &JsonPathExpression,
) -> Option<DbColumnName> {
    if let Some(column) = table.column_by_source_path(path) {
        return Some(column.stored_name().clone());
    }
    reference_fks
        .iter()
        .find(|(object_path, fk)| {
            object_path.is_prefix_of(path) && table.column(fk).is_some()
        })
        .map(|(_, fk)| fk.clone())
}

/// FK targets for every document reference binding: the root table of the
/// target resource, its abstract identity table, or the shared descriptor
/// table, with identity update cascade only where the dialect allows it.
fn derive_reference_foreign_keys(
    context: &mut RelationalModelSetBuilderContext,
) -> Result<(), DerivationError> {
    struct Target {
        table: DbTableName,
        allow_identity_updates: bool,
    }

    let mut targets: BTreeMap<QualifiedResourceName, Target> = BTreeMap::new();
    for entry in &context.resources {
        let table = match entry.model.storage_kind {
            ResourceStorageKind::RelationalTables => entry.model.root_table().table.clone(),
            ResourceStorageKind::SharedDescriptorTable => {
                crate::derive::resource::columns::shared_descriptor_table()
            }
        };
        targets.insert(
            entry.resource_key.resource.clone(),
            Target {
                table,
                allow_identity_updates: entry.model.allow_identity_updates,
            },
        );
    }
    for info in &context.abstract_identity_tables {
        targets.insert(
            info.abstract_resource_key.resource.clone(),
            Target {
                table: info.table.table.clone(),
                // Abstract identity rows are maintained by triggers, not by
                // cascading updates from members.
                allow_identity_updates: false,
            },
        );
    }

    let cascade_updates = context.dialect_rules().supports_cascading_identity_updates();

    for entry in &mut context.resources {
        if entry.model.storage_kind != ResourceStorageKind::RelationalTables {
            continue;
        }
        let model_resource = entry.model.resource.clone();
        let bindings: Vec<DocumentReferenceBinding> =
            entry.model.document_reference_bindings.clone();
        for binding in &bindings {
            let target = targets.get(&binding.target_resource).ok_or_else(|| {
                DerivationError::resolution(format!(
                    "reference target {} on resource {model_resource} is not part of the effective schema set",
                    binding.target_resource
                ))
            })?;
            let table = entry.model.table_by_name_mut(&binding.table).ok_or_else(|| {
                DerivationError::resolution(format!(
                    "no table named {} on {model_resource}",
                    binding.table
                ))
            })?;

            let fk_stored = table
                .column(&binding.fk_column)
                .map(|column| column.stored_name().clone())
                .unwrap_or_else(|| binding.fk_column.clone());
            let on_update = if cascade_updates && target.allow_identity_updates {
                ReferentialAction::Cascade
            } else {
                ReferentialAction::NoAction
            };
            table.constraints.push(TableConstraint::ForeignKey {
                name: naming::foreign_key_name(
                    &table.table,
                    &[naming::reference_base_of(&binding.fk_column)],
                ),
                columns: vec![fk_stored.clone()],
                target_table: target.table.clone(),
                target_columns: vec![DbColumnName::new(naming::DOCUMENT_ID)],
                on_delete: ReferentialAction::NoAction,
                on_update,
            });

            // A present optional reference must carry all of its projected
            // identity values.
            if !binding.is_required && !binding.identity_bindings.is_empty() {
                let dependent_columns: Vec<DbColumnName> = binding
                    .identity_bindings
                    .iter()
                    .map(|identity| {
                        table
                            .column(&identity.column)
                            .map(|column| column.stored_name().clone())
                            .unwrap_or_else(|| identity.column.clone())
                    })
                    .collect();
                let base = naming::reference_base_of(&binding.fk_column);
                table.constraints.push(TableConstraint::AllOrNoneNullability {
                    name: naming::all_or_none_name(&table.table, &base),
                    fk_column: fk_stored,
                    dependent_columns,
                });
            }
        }
    }
    Ok(())
}
