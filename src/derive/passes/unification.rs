//! Key unification: collapses columns that equality constraints force to hold
//! the same value into one stored column plus aliases.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::resource::extract::ResourceInputs;
use crate::derive::resource::ordering;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::{DbColumnName, QualifiedResourceName};
use crate::model::resource::{
    EqualityConstraintEndpoint, EqualityConstraintIgnoredReason, KeyUnificationClass,
    KeyUnificationEqualityConstraint,
};
use crate::model::table::TableConstraint;
use crate::naming;
use crate::path::JsonPathExpression;

pub struct KeyUnificationPass;

impl RelationalModelSetPass for KeyUnificationPass {
    fn name(&self) -> &'static str {
        "key-unification"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let resources: Vec<QualifiedResourceName> = context
            .inputs_by_resource
            .values()
            .filter(|inputs| !inputs.is_descriptor && !inputs.equality_constraints.is_empty())
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
            unify_resource(context, &inputs)?;
        }

        debug!(pass = self.name(), resources = resources.len(), "applied key unification");
        Ok(())
    }
}

/// One resolved equality-constraint endpoint.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResolvedEndpoint {
    table_index: usize,
    column: DbColumnName,
}

enum PairOutcome {
    Applied(ResolvedEndpoint),
    Redundant,
    Ignored(EqualityConstraintIgnoredReason),
}

fn unify_resource(
    context: &mut RelationalModelSetBuilderContext,
    inputs: &ResourceInputs,
) -> Result<(), DerivationError> {
    let model_resource = context.model_resource_for(&inputs.resource);
    let entry = context.model_for_mut(&model_resource).ok_or_else(|| {
        DerivationError::resolution(format!("no model found for resource {model_resource}"))
    })?;
    let model = &mut entry.model;

    // Undirected pairs, deduplicated, declaration order preserved.
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut pairs: Vec<(JsonPathExpression, JsonPathExpression)> = Vec::new();
    for constraint in &inputs.equality_constraints {
        let mut key = (
            constraint.source_json_path.canonical().to_string(),
            constraint.target_json_path.canonical().to_string(),
        );
        if key.0 > key.1 {
            std::mem::swap(&mut key.0, &mut key.1);
        }
        if seen.insert(key) {
            pairs.push((
                constraint.source_json_path.clone(),
                constraint.target_json_path.clone(),
            ));
        }
    }

    let mut union_find: BTreeMap<ResolvedEndpoint, ResolvedEndpoint> = BTreeMap::new();
    let mut outcomes: Vec<(EqualityConstraintEndpoint, EqualityConstraintEndpoint, PairOutcome)> =
        Vec::new();

    for (path_a, path_b) in &pairs {
        let a = resolve_endpoint(model, path_a, &inputs.resource)?;
        let b = resolve_endpoint(model, path_b, &inputs.resource)?;
        let endpoint_a = EqualityConstraintEndpoint {
            path: path_a.clone(),
            column: a.column.clone(),
        };
        let endpoint_b = EqualityConstraintEndpoint {
            path: path_b.clone(),
            column: b.column.clone(),
        };

        let outcome = if a.table_index != b.table_index {
            PairOutcome::Ignored(EqualityConstraintIgnoredReason::CrossTable)
        } else if a == b {
            PairOutcome::Redundant
        } else {
            check_unifiable(model, &inputs.resource, &a, &b, path_a, path_b)?;
            union(&mut union_find, a.clone(), b);
            PairOutcome::Applied(a)
        };
        outcomes.push((endpoint_a, endpoint_b, outcome));
    }

    // Classes with at least two members, grouped per table.
    let mut classes_by_root: BTreeMap<ResolvedEndpoint, Vec<ResolvedEndpoint>> = BTreeMap::new();
    let members: Vec<ResolvedEndpoint> = union_find.keys().cloned().collect();
    for member in members {
        let root = find(&mut union_find, member.clone());
        classes_by_root.entry(root).or_default().push(member);
    }

    struct ClassPlan {
        table_index: usize,
        canonical: DbColumnName,
        members: Vec<DbColumnName>,
    }

    let mut plans: Vec<ClassPlan> = Vec::new();
    let mut canonical_by_member: BTreeMap<ResolvedEndpoint, DbColumnName> = BTreeMap::new();
    for (_, class_members) in classes_by_root {
        if class_members.len() < 2 {
            continue;
        }
        let table_index = class_members[0].table_index;
        // Canonical member: lexicographically smallest canonical source path,
        // column name as the tiebreaker.
        let mut ordered: Vec<(String, DbColumnName)> = class_members
            .iter()
            .map(|member| {
                let source = model.tables[table_index]
                    .column(&member.column)
                    .and_then(|column| column.source_json_path.as_ref())
                    .map(|path| path.canonical().to_string())
                    .unwrap_or_default();
                (source, member.column.clone())
            })
            .collect();
        ordered.sort();

        let canonical = ordered[0].1.clone();
        for member in &class_members {
            canonical_by_member.insert(member.clone(), canonical.clone());
        }
        plans.push(ClassPlan {
            table_index,
            canonical,
            members: ordered.into_iter().map(|(_, column)| column).collect(),
        });
    }
    plans.sort_by(|a, b| {
        (a.table_index, &a.canonical).cmp(&(b.table_index, &b.canonical))
    });

    for plan in &plans {
        apply_class(model, plan.table_index, &plan.canonical, &plan.members)?;
        model.key_unification_classes.push(KeyUnificationClass {
            table: model.tables[plan.table_index].table.clone(),
            canonical_column: plan.canonical.clone(),
            member_columns: plan.members.clone(),
        });
        ordering::canonicalize_table(&mut model.tables[plan.table_index]);
    }

    for (endpoint_a, endpoint_b, outcome) in outcomes {
        model
            .key_unification_equality_constraints
            .push(match outcome {
                PairOutcome::Applied(member) => {
                    let canonical = canonical_by_member
                        .get(&member)
                        .cloned()
                        .unwrap_or_else(|| member.column.clone());
                    KeyUnificationEqualityConstraint::Applied {
                        endpoint_a,
                        endpoint_b,
                        canonical_column: canonical,
                    }
                }
                PairOutcome::Redundant => KeyUnificationEqualityConstraint::Redundant {
                    endpoint_a,
                    endpoint_b,
                },
                PairOutcome::Ignored(reason) => KeyUnificationEqualityConstraint::Ignored {
                    endpoint_a,
                    endpoint_b,
                    reason,
                },
            });
    }

    Ok(())
}

fn resolve_endpoint(
    model: &crate::model::resource::RelationalResourceModel,
    path: &JsonPathExpression,
    resource: &QualifiedResourceName,
) -> Result<ResolvedEndpoint, DerivationError> {
    let mut found: Vec<ResolvedEndpoint> = Vec::new();
    for (table_index, table) in model.tables.iter().enumerate() {
        if let Some(column) = table.column_by_source_path(path) {
            found.push(ResolvedEndpoint {
                table_index,
                column: column.name.clone(),
            });
        }
    }
    match found.len() {
        0 => Err(DerivationError::unification(format!(
            "equality constraint path '{}' on resource {resource} was not bound to any column",
            path.canonical()
        ))),
        1 => Ok(found.remove(0)),
        _ => Err(DerivationError::unification(format!(
            "equality constraint path '{}' on resource {resource} resolved to multiple distinct bindings",
            path.canonical()
        ))),
    }
}

fn check_unifiable(
    model: &crate::model::resource::RelationalResourceModel,
    resource: &QualifiedResourceName,
    a: &ResolvedEndpoint,
    b: &ResolvedEndpoint,
    path_a: &JsonPathExpression,
    path_b: &JsonPathExpression,
) -> Result<(), DerivationError> {
    let table = &model.tables[a.table_index];
    let column_a = table.column(&a.column).ok_or_else(|| {
        DerivationError::unification(format!(
            "column '{}' vanished from table '{}'",
            a.column, table.table
        ))
    })?;
    let column_b = table.column(&b.column).ok_or_else(|| {
        DerivationError::unification(format!(
            "column '{}' vanished from table '{}'",
            b.column, table.table
        ))
    })?;

    for (column, path) in [(column_a, path_a), (column_b, path_b)] {
        if !matches!(column.kind, ColumnKind::Scalar | ColumnKind::DescriptorFk) {
            return Err(DerivationError::unification(format!(
                "equality constraint path '{}' on resource {resource} resolves to column '{}': unsupported column kind",
                path.canonical(),
                column.name
            )));
        }
    }
    if column_a.kind != column_b.kind || column_a.scalar_type != column_b.scalar_type {
        return Err(DerivationError::unification(format!(
            "equality constraint on resource {resource} joins incompatible columns '{}' ({}) and '{}' ({})",
            column_a.name,
            scalar_label(column_a.scalar_type),
            column_b.name,
            scalar_label(column_b.scalar_type)
        )));
    }
    Ok(())
}

fn scalar_label(scalar_type: Option<RelationalScalarType>) -> String {
    scalar_type
        .map(|scalar| scalar.label())
        .unwrap_or_else(|| "none".to_string())
}

/// Rewrites every alias member of one unification class to point at the
/// canonical stored column.
fn apply_class(
    model: &mut crate::model::resource::RelationalResourceModel,
    table_index: usize,
    canonical: &DbColumnName,
    members: &[DbColumnName],
) -> Result<(), DerivationError> {
    let canonical_nullable = {
        let table = &model.tables[table_index];
        members.iter().all(|member| {
            table
                .column(member)
                .map(|column| column.is_nullable)
                .unwrap_or(true)
        })
    };

    // Presence columns for aliases backed by a reference identity projection
    // come from the owning reference's FK column.
    let table_name = model.tables[table_index].table.clone();
    let fk_presence: BTreeMap<DbColumnName, DbColumnName> = model
        .document_reference_bindings
        .iter()
        .filter(|binding| binding.table == table_name)
        .flat_map(|binding| {
            binding
                .identity_bindings
                .iter()
                .map(|identity| (identity.column.clone(), binding.fk_column.clone()))
        })
        .collect();

    let mut synthesized: Vec<DbColumnModel> = Vec::new();
    let mut presence_constraints: Vec<TableConstraint> = Vec::new();
    {
        let table = &mut model.tables[table_index];
        for member in members {
            if member == canonical {
                continue;
            }
            let alias_nullable = table
                .column(member)
                .map(|column| column.is_nullable)
                .unwrap_or(true);
            let presence = if let Some(fk) = fk_presence.get(member) {
                Some(fk.clone())
            } else if alias_nullable {
                let presence_name = naming::presence_column(member);
                synthesized.push(DbColumnModel {
                    name: presence_name.clone(),
                    kind: ColumnKind::Scalar,
                    scalar_type: Some(RelationalScalarType::Boolean),
                    is_nullable: true,
                    source_json_path: None,
                    target_resource: None,
                    storage: ColumnStorage::Stored,
                });
                presence_constraints.push(TableConstraint::NullOrTrue {
                    name: naming::null_or_true_name(&table.table, &presence_name),
                    column: presence_name.clone(),
                });
                Some(presence_name)
            } else {
                None
            };

            let column = table.column_mut(member).ok_or_else(|| {
                DerivationError::unification(format!(
                    "column '{member}' vanished from table '{table_name}'"
                ))
            })?;
            column.storage = ColumnStorage::UnifiedAlias {
                canonical: canonical.clone(),
                presence,
            };
        }

        if let Some(column) = table.column_mut(canonical) {
            column.is_nullable = canonical_nullable;
        }
        table.columns.append(&mut synthesized);
        table.constraints.append(&mut presence_constraints);

        rewrite_constraint_columns(table, members, canonical);
    }

    Ok(())
}

/// Inline FK constraints that referenced an alias column now reference the
/// canonical stored column; exact duplicates that fall out are dropped.
fn rewrite_constraint_columns(
    table: &mut crate::model::table::DbTableModel,
    members: &[DbColumnName],
    canonical: &DbColumnName,
) {
    let aliases: BTreeSet<&DbColumnName> =
        members.iter().filter(|member| *member != canonical).collect();

    for constraint in &mut table.constraints {
        if let TableConstraint::ForeignKey { columns, .. } = constraint {
            for column in columns.iter_mut() {
                if aliases.contains(column) {
                    *column = canonical.clone();
                }
            }
        }
    }

    let mut seen: BTreeSet<(Vec<String>, String, Vec<String>)> = BTreeSet::new();
    table.constraints.retain(|constraint| match constraint {
        TableConstraint::ForeignKey {
            columns,
            target_table,
            target_columns,
            ..
        } => seen.insert((
            columns.iter().map(|column| column.as_str().to_string()).collect(),
            target_table.to_string(),
            target_columns
                .iter()
                .map(|column| column.as_str().to_string())
                .collect(),
        )),
        _ => true,
    });
}

fn find(
    union_find: &mut BTreeMap<ResolvedEndpoint, ResolvedEndpoint>,
    member: ResolvedEndpoint,
) -> ResolvedEndpoint {
    let parent = match union_find.get(&member) {
        Some(parent) => parent.clone(),
        None => return member,
    };
    if parent == member {
        return member;
    }
    let root = find(union_find, parent);
    union_find.insert(member, root.clone());
    root
}

fn union(
    union_find: &mut BTreeMap<ResolvedEndpoint, ResolvedEndpoint>,
    a: ResolvedEndpoint,
    b: ResolvedEndpoint,
) {
    union_find.entry(a.clone()).or_insert_with(|| a.clone());
    union_find.entry(b.clone()).or_insert_with(|| b.clone());
    let root_a = find(union_find, a);
    let root_b = find(union_find, b);
    if root_a != root_b {
        // Smaller root wins so class identity is order independent.
        if root_a < root_b {
            union_find.insert(root_b, root_a);
        } else {
            union_find.insert(root_a, root_b);
        }
    }
}
