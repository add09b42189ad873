//! Index inventory: primary key, unique constraint, and FK-support indexes
//! for every physical table.

use std::collections::BTreeSet;

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::inventory::{DbIndexInfo, DbIndexKind};
use crate::model::names::{DbColumnName, DbIndexName};
use crate::model::table::{DbTableModel, TableConstraint};
use crate::naming;

pub struct IndexInventoryPass;

impl RelationalModelSetPass for IndexInventoryPass {
    fn name(&self) -> &'static str {
        "index-inventory"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let rules = context.dialect_rules();

        // Descriptor models all share one physical table; emit its indexes
        // once.
        let mut seen_tables: BTreeSet<String> = BTreeSet::new();
        let mut indexes: Vec<DbIndexInfo> = Vec::new();

        for entry in &context.resources {
            for table in &entry.model.tables {
                if seen_tables.insert(table.table.to_string()) {
                    derive_table_indexes(table, rules, &mut indexes);
                }
            }
        }
        for info in &context.abstract_identity_tables {
            if seen_tables.insert(info.table.table.to_string()) {
                derive_table_indexes(&info.table, rules, &mut indexes);
            }
        }

        context.indexes.append(&mut indexes);
        debug!(pass = self.name(), indexes = context.indexes.len(), "derived index inventory");
        Ok(())
    }
}

fn derive_table_indexes(
    table: &DbTableModel,
    rules: &'static dyn crate::dialect::SqlDialectRules,
    indexes: &mut Vec<DbIndexInfo>,
) {
    let pk_columns: Vec<DbColumnName> = table.key.column_names();

    indexes.push(DbIndexInfo {
        name: DbIndexName::new(&table.key.name),
        table: table.table.clone(),
        key_columns: pk_columns.clone(),
        is_unique: true,
        kind: DbIndexKind::PrimaryKey,
    });

    let mut emitted: BTreeSet<String> = BTreeSet::new();
    for constraint in &table.constraints {
        match constraint {
            TableConstraint::Unique { name, columns } => {
                indexes.push(DbIndexInfo {
                    name: DbIndexName::new(name),
                    table: table.table.clone(),
                    key_columns: columns.clone(),
                    is_unique: true,
                    kind: DbIndexKind::UniqueConstraint,
                });
            }
            TableConstraint::ForeignKey { columns, .. } => {
                // The PK already covers FKs whose columns are a leftmost
                // prefix of it.
                if is_prefix(columns, &pk_columns) {
                    continue;
                }
                let name = rules.shorten_identifier(&naming::index_name(&table.table, columns));
                if emitted.insert(name.clone()) {
                    indexes.push(DbIndexInfo {
                        name: DbIndexName::new(name),
                        table: table.table.clone(),
                        key_columns: columns.clone(),
                        is_unique: false,
                        kind: DbIndexKind::ForeignKeySupport,
                    });
                }
            }
            _ => {}
        }
    }
}

fn is_prefix(columns: &[DbColumnName], key: &[DbColumnName]) -> bool {
    columns.len() <= key.len() && columns.iter().zip(key).all(|(a, b)| a == b)
}
