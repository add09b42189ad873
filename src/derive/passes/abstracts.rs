//! Abstract identity tables and union views: one physical identity table per
//! abstract resource, plus a read-side view unioning every concrete member.

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::abstracts::{
    AbstractIdentityTableInfo, AbstractUnionViewArm, AbstractUnionViewInfo,
    AbstractUnionViewOutputColumn, UnionArmProjection,
};
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::{DbColumnName, DbTableName, QualifiedResourceName};
use crate::model::table::{DbKeyColumn, DbTableModel, TableConstraint, TableKey};
use crate::naming;
use crate::path::JsonPathExpression;

const DISCRIMINATOR_MAX_LENGTH: u32 = 256;

pub struct AbstractIdentityAndUnionViewPass;

impl RelationalModelSetPass for AbstractIdentityAndUnionViewPass {
    fn name(&self) -> &'static str {
        "abstract-identity-and-union-view"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let abstracts: Vec<(QualifiedResourceName, Vec<JsonPathExpression>)> = context
            .abstract_identity_paths
            .iter()
            .map(|(resource, paths)| (resource.clone(), paths.clone()))
            .collect();

        for (abstract_resource, identity_paths) in &abstracts {
            derive_abstract(context, abstract_resource, identity_paths)?;
        }

        debug!(
            pass = self.name(),
            identity_tables = context.abstract_identity_tables.len(),
            union_views = context.abstract_union_views.len(),
            "derived abstract identity tables and union views"
        );
        Ok(())
    }
}

struct Member {
    resource: QualifiedResourceName,
    root_table: DbTableName,
    /// One projected column per abstract identity path.
    identity_columns: Vec<(DbColumnName, RelationalScalarType)>,
}

fn derive_abstract(
    context: &mut RelationalModelSetBuilderContext,
    abstract_resource: &QualifiedResourceName,
    identity_paths: &[JsonPathExpression],
) -> Result<(), DerivationError> {
    let members = collect_members(context, abstract_resource, identity_paths)?;
    if members.is_empty() {
        return Err(DerivationError::resolution(format!(
            "abstract resource {abstract_resource} has no concrete members"
        )));
    }

    let schema = context.physical_schema_for_project(&abstract_resource.project_name)?;
    let base = naming::to_pascal_case(&abstract_resource.resource_name);
    let identity_table_name = DbTableName::new(schema.clone(), format!("{base}Identity"));
    let view_name = DbTableName::new(schema, format!("{base}_View"));

    // Output columns carry the widened type across all members.
    let mut output_columns = vec![AbstractUnionViewOutputColumn {
        name: DbColumnName::new(naming::DOCUMENT_ID),
        scalar_type: RelationalScalarType::Int64,
    }];
    for (index, path) in identity_paths.iter().enumerate() {
        let column_name = DbColumnName::new(naming::column_base_for_segments(path.segments()));
        let mut widened: Option<RelationalScalarType> = None;
        for member in &members {
            let (_, member_type) = &member.identity_columns[index];
            widened = Some(match widened {
                None => *member_type,
                Some(current) => widen(current, *member_type).ok_or_else(|| {
                    DerivationError::resolution(format!(
                        "inconsistent column types for '{column_name}' across members of abstract resource {abstract_resource}: {} vs {}",
                        current.label(),
                        member_type.label()
                    ))
                })?,
            });
        }
        output_columns.push(AbstractUnionViewOutputColumn {
            name: column_name,
            scalar_type: widened.unwrap_or(RelationalScalarType::Int64),
        });
    }
    output_columns.push(AbstractUnionViewOutputColumn {
        name: DbColumnName::new(naming::DISCRIMINATOR),
        scalar_type: RelationalScalarType::String {
            max_length: Some(DISCRIMINATOR_MAX_LENGTH),
        },
    });

    let identity_table = build_identity_table(&identity_table_name, &output_columns);

    let arms = members
        .iter()
        .map(|member| {
            let mut projections = vec![UnionArmProjection::SourceColumn {
                column: DbColumnName::new(naming::DOCUMENT_ID),
                scalar_type: Some(RelationalScalarType::Int64),
            }];
            for (column, scalar_type) in &member.identity_columns {
                projections.push(UnionArmProjection::SourceColumn {
                    column: column.clone(),
                    scalar_type: Some(*scalar_type),
                });
            }
            let literal = member.resource.to_string();
            if literal.len() > DISCRIMINATOR_MAX_LENGTH as usize {
                return Err(DerivationError::resolution(format!(
                    "discriminator literal for member {} of abstract resource {abstract_resource} exceeds {DISCRIMINATOR_MAX_LENGTH} characters",
                    member.resource
                )));
            }
            projections.push(UnionArmProjection::StringLiteral(literal));
            Ok(AbstractUnionViewArm {
                member_resource_key: context.resource_key(&member.resource)?,
                source_table: member.root_table.clone(),
                projections,
            })
        })
        .collect::<Result<Vec<_>, DerivationError>>()?;

    let abstract_resource_key = context.resource_key(abstract_resource)?;
    context.abstract_identity_tables.push(AbstractIdentityTableInfo {
        abstract_resource_key: abstract_resource_key.clone(),
        table: identity_table,
    });
    context.abstract_union_views.push(AbstractUnionViewInfo {
        abstract_resource_key,
        view: view_name,
        output_columns,
        arms,
    });

    Ok(())
}

/// Collects concrete members (subclasses of the abstract resource) in
/// `(project name, resource name)` order, resolving each member's identity
/// columns.
fn collect_members(
    context: &RelationalModelSetBuilderContext,
    abstract_resource: &QualifiedResourceName,
    identity_paths: &[JsonPathExpression],
) -> Result<Vec<Member>, DerivationError> {
    let mut members = Vec::new();

    // The inputs map iterates in (project, resource) order already.
    for (resource, inputs) in &context.inputs_by_resource {
        if !inputs.is_subclass || inputs.superclass.as_ref() != Some(abstract_resource) {
            continue;
        }
        let entry = context.model_for(resource).ok_or_else(|| {
            DerivationError::resolution(format!(
                "no model found for member {resource} of abstract resource {abstract_resource}"
            ))
        })?;
        let root = entry.model.root_table();

        let mut identity_columns = Vec::new();
        for path in identity_paths {
            let member_path = if inputs.superclass_identity_json_path.as_ref() == Some(path) {
                // The member renames this superclass identity path to its own
                // single identity path.
                if inputs.identity_json_paths.len() != 1 {
                    return Err(DerivationError::resolution(format!(
                        "member {resource} of abstract resource {abstract_resource} renames '{}' but declares {} identity paths instead of exactly one",
                        path.canonical(),
                        inputs.identity_json_paths.len()
                    )));
                }
                inputs.identity_json_paths[0].clone()
            } else {
                path.clone()
            };

            let column = root.column_by_source_path(&member_path).ok_or_else(|| {
                DerivationError::resolution(format!(
                    "identity column for path '{}' was not found on member {resource} of abstract resource {abstract_resource}",
                    member_path.canonical()
                ))
            })?;
            let scalar_type = column.scalar_type.ok_or_else(|| {
                DerivationError::resolution(format!(
                    "identity column '{}' on member {resource} of abstract resource {abstract_resource} has no scalar type",
                    column.name
                ))
            })?;
            identity_columns.push((column.name.clone(), scalar_type));
        }

        members.push(Member {
            resource: resource.clone(),
            root_table: root.table.clone(),
            identity_columns,
        });
    }

    // Member resource names must be unique across projects; the view's
    // discriminator and downstream physical names depend on it.
    let mut names: Vec<&str> = members
        .iter()
        .map(|member| member.resource.resource_name.as_str())
        .collect();
    names.sort_unstable();
    for pair in names.windows(2) {
        if pair[0] == pair[1] {
            return Err(DerivationError::resolution(format!(
                "duplicate member ResourceName '{}' under abstract resource {abstract_resource}",
                pair[0]
            )));
        }
    }

    Ok(members)
}

fn build_identity_table(
    table: &DbTableName,
    output_columns: &[AbstractUnionViewOutputColumn],
) -> DbTableModel {
    let columns: Vec<DbColumnModel> = output_columns
        .iter()
        .map(|output| DbColumnModel {
            name: output.name.clone(),
            kind: if output.name.as_str() == naming::DOCUMENT_ID {
                ColumnKind::ParentKeyPart
            } else {
                ColumnKind::Scalar
            },
            scalar_type: Some(output.scalar_type),
            is_nullable: false,
            source_json_path: None,
            target_resource: None,
            storage: ColumnStorage::Stored,
        })
        .collect();

    let identity_column_names: Vec<DbColumnName> = output_columns
        .iter()
        .filter(|output| {
            output.name.as_str() != naming::DOCUMENT_ID
                && output.name.as_str() != naming::DISCRIMINATOR
        })
        .map(|output| output.name.clone())
        .collect();

    let mut constraints = Vec::new();
    if !identity_column_names.is_empty() {
        constraints.push(TableConstraint::Unique {
            name: naming::unique_name(table, &identity_column_names),
            columns: identity_column_names,
        });
    }

    DbTableModel {
        table: table.clone(),
        json_scope: JsonPathExpression::root(),
        key: TableKey {
            name: naming::primary_key_name(table),
            columns: vec![DbKeyColumn {
                name: DbColumnName::new(naming::DOCUMENT_ID),
                kind: ColumnKind::ParentKeyPart,
            }],
        },
        columns,
        constraints,
    }
}

/// Widens two member column types to a common view output type: equal types
/// stand, strings widen to the larger max length (an unbounded member wins),
/// and 32-bit integers widen to 64-bit.
fn widen(
    a: RelationalScalarType,
    b: RelationalScalarType,
) -> Option<RelationalScalarType> {
    use RelationalScalarType::*;
    if a == b {
        return Some(a);
    }
    match (a, b) {
        (String { max_length: la }, String { max_length: lb }) => Some(String {
            max_length: match (la, lb) {
                (Some(la), Some(lb)) => Some(la.max(lb)),
                _ => None,
            },
        }),
        (Int32, Int64) | (Int64, Int32) => Some(Int64),
        _ => None,
    }
}
