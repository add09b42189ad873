//! Identifier shortening: applies the dialect's identifier length limit to
//! every physical name and fails on post-shortening collisions.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::RelationalModelSetPass;
use crate::dialect::SqlDialectRules;
use crate::error::DerivationError;
use crate::model::abstracts::UnionArmProjection;
use crate::model::column::ColumnStorage;
use crate::model::names::{DbColumnName, DbTableName};
use crate::model::table::{DbTableModel, TableConstraint};

pub struct IdentifierShorteningPass;

impl RelationalModelSetPass for IdentifierShorteningPass {
    fn name(&self) -> &'static str {
        "identifier-shortening"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let rules = context.dialect_rules();
        let renames = collect_renames(context, rules)?;
        apply_renames(context, rules, &renames);
        debug!(
            pass = self.name(),
            tables = renames.tables.len(),
            columns = renames.columns.len(),
            "shortened identifiers"
        );
        Ok(())
    }
}

type SchemaScoped = (String, String);

struct RenameMaps {
    /// `(schema, old table name)` to the shortened table name.
    tables: BTreeMap<SchemaScoped, String>,
    /// `(schema, old table name, old column name)` to the shortened column
    /// name.
    columns: BTreeMap<(String, String, String), String>,
}

impl RenameMaps {
    fn table(&self, table: &DbTableName) -> DbTableName {
        let key = (table.schema().as_str().to_string(), table.name().to_string());
        match self.tables.get(&key) {
            Some(short) => table.renamed(short),
            None => table.clone(),
        }
    }

    fn column(&self, table: &DbTableName, column: &DbColumnName) -> DbColumnName {
        let key = (
            table.schema().as_str().to_string(),
            table.name().to_string(),
            column.as_str().to_string(),
        );
        match self.columns.get(&key) {
            Some(short) => DbColumnName::new(short),
            None => column.clone(),
        }
    }
}

fn collect_renames(
    context: &RelationalModelSetBuilderContext,
    rules: &'static dyn SqlDialectRules,
) -> Result<RenameMaps, DerivationError> {
    let mut tables: BTreeMap<SchemaScoped, String> = BTreeMap::new();
    let mut table_originals: BTreeMap<SchemaScoped, BTreeSet<String>> = BTreeMap::new();
    let mut columns: BTreeMap<(String, String, String), String> = BTreeMap::new();
    let mut column_originals: BTreeMap<(String, String, String), BTreeSet<String>> =
        BTreeMap::new();
    let mut constraint_originals: BTreeMap<SchemaScoped, BTreeSet<String>> = BTreeMap::new();

    let mut visit_table_name = |table: &DbTableName| {
        let schema = table.schema().as_str().to_string();
        let short = rules.shorten_identifier(table.name());
        table_originals
            .entry((schema.clone(), short.clone()))
            .or_default()
            .insert(table.name().to_string());
        tables.insert((schema, table.name().to_string()), short);
    };
    let mut visit_column_name = |table: &DbTableName, column: &DbColumnName| {
        let schema = table.schema().as_str().to_string();
        let short = rules.shorten_identifier(column.as_str());
        column_originals
            .entry((schema.clone(), table.name().to_string(), short.clone()))
            .or_default()
            .insert(column.as_str().to_string());
        columns.insert(
            (schema, table.name().to_string(), column.as_str().to_string()),
            short,
        );
    };
    let mut visit_constraint_name = |table: &DbTableName, name: &str| {
        let schema = table.schema().as_str().to_string();
        let short = rules.shorten_identifier(name);
        constraint_originals
            .entry((schema, short))
            .or_default()
            .insert(name.to_string());
    };

    let mut visit_table = |table: &DbTableModel| {
        visit_table_name(&table.table);
        visit_constraint_name(&table.table, &table.key.name);
        for part in &table.key.columns {
            visit_column_name(&table.table, &part.name);
        }
        for column in &table.columns {
            visit_column_name(&table.table, &column.name);
        }
        for constraint in &table.constraints {
            visit_constraint_name(&table.table, constraint.name());
        }
    };

    for entry in &context.resources {
        for table in &entry.model.tables {
            visit_table(table);
        }
    }
    for info in &context.abstract_identity_tables {
        visit_table(&info.table);
    }
    for view in &context.abstract_union_views {
        visit_table_name(&view.view);
        for output in &view.output_columns {
            visit_column_name(&view.view, &output.name);
        }
    }

    check_collisions("table", table_originals)?;
    check_column_collisions(column_originals)?;
    check_collisions("constraint", constraint_originals)?;

    Ok(RenameMaps { tables, columns })
}

fn check_collisions(
    kind: &str,
    originals: BTreeMap<SchemaScoped, BTreeSet<String>>,
) -> Result<(), DerivationError> {
    for ((schema, short), names) in originals {
        if names.len() > 1 {
            return Err(DerivationError::collision(format!(
                "{kind} name '{short}' in schema '{schema}' is shortened from multiple identifiers: {}",
                names.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
    }
    Ok(())
}

fn check_column_collisions(
    originals: BTreeMap<(String, String, String), BTreeSet<String>>,
) -> Result<(), DerivationError> {
    for ((schema, table, short), names) in originals {
        if names.len() > 1 {
            return Err(DerivationError::collision(format!(
                "column name '{short}' on table '{schema}.{table}' is shortened from multiple identifiers: {}",
                names.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
    }
    Ok(())
}

fn apply_renames(
    context: &mut RelationalModelSetBuilderContext,
    rules: &'static dyn SqlDialectRules,
    renames: &RenameMaps,
) {
    for entry in &mut context.resources {
        let model = &mut entry.model;
        for table in &mut model.tables {
            rewrite_table(table, rules, renames);
        }
        for binding in &mut model.document_reference_bindings {
            binding.fk_column = renames.column(&binding.table, &binding.fk_column);
            for identity in &mut binding.identity_bindings {
                identity.column = renames.column(&binding.table, &identity.column);
            }
            binding.table = renames.table(&binding.table);
        }
        for edge in &mut model.descriptor_edge_sources {
            edge.fk_column = renames.column(&edge.table, &edge.fk_column);
            edge.table = renames.table(&edge.table);
        }
        for class in &mut model.key_unification_classes {
            class.canonical_column = renames.column(&class.table, &class.canonical_column);
            for member in &mut class.member_columns {
                *member = renames.column(&class.table, member);
            }
            class.table = renames.table(&class.table);
        }
    }

    for info in &mut context.abstract_identity_tables {
        rewrite_table(&mut info.table, rules, renames);
    }
    for view in &mut context.abstract_union_views {
        for output in &mut view.output_columns {
            output.name = renames.column(&view.view, &output.name);
        }
        for arm in &mut view.arms {
            for projection in &mut arm.projections {
                if let UnionArmProjection::SourceColumn { column, .. } = projection {
                    *column = renames.column(&arm.source_table, column);
                }
            }
            arm.source_table = renames.table(&arm.source_table);
        }
        view.view = renames.table(&view.view);
    }
}

fn rewrite_table(
    table: &mut DbTableModel,
    rules: &'static dyn SqlDialectRules,
    renames: &RenameMaps,
) {
    let old_name = table.table.clone();

    table.key.name = rules.shorten_identifier(&table.key.name);
    for part in &mut table.key.columns {
        part.name = renames.column(&old_name, &part.name);
    }

    for column in &mut table.columns {
        column.name = renames.column(&old_name, &column.name);
        if let ColumnStorage::UnifiedAlias { canonical, presence } = &mut column.storage {
            *canonical = renames.column(&old_name, canonical);
            if let Some(presence) = presence {
                *presence = renames.column(&old_name, presence);
            }
        }
    }

    for constraint in &mut table.constraints {
        match constraint {
            TableConstraint::Unique { name, columns } => {
                *name = rules.shorten_identifier(name);
                for column in columns {
                    *column = renames.column(&old_name, column);
                }
            }
            TableConstraint::ForeignKey {
                name,
                columns,
                target_table,
                target_columns,
                ..
            } => {
                *name = rules.shorten_identifier(name);
                for column in columns {
                    *column = renames.column(&old_name, column);
                }
                for column in target_columns.iter_mut() {
                    *column = renames.column(target_table, column);
                }
                *target_table = renames.table(target_table);
            }
            TableConstraint::AllOrNoneNullability {
                name,
                fk_column,
                dependent_columns,
            } => {
                *name = rules.shorten_identifier(name);
                *fk_column = renames.column(&old_name, fk_column);
                for column in dependent_columns {
                    *column = renames.column(&old_name, column);
                }
            }
            TableConstraint::NullOrTrue { name, column } => {
                *name = rules.shorten_identifier(name);
                *column = renames.column(&old_name, column);
            }
        }
    }

    table.table = renames.table(&old_name);
}
