//! Step 6: canonicalize ordering inside each table.
//!
//! Column order: key parts in key order, then descriptor FK columns, then all
//! remaining columns, each group keeping stable insertion order; a unified
//! alias always lands after its canonical and presence columns, even when
//! that crosses group boundaries. Constraint order: kind rank, then name.
//! Re-run after any pass that adds or rewrites columns or constraints.

use crate::model::column::{ColumnKind, ColumnStorage};
use crate::model::names::DbColumnName;
use crate::model::resource::RelationalResourceModel;
use crate::model::table::DbTableModel;

pub fn canonicalize_model(model: &mut RelationalResourceModel) {
    for table in &mut model.tables {
        canonicalize_table(table);
    }
}

pub fn canonicalize_table(table: &mut DbTableModel) {
    let key_order: Vec<DbColumnName> = table.key.column_names();
    let group = |column: &crate::model::column::DbColumnModel| -> (u8, usize) {
        if let Some(position) = key_order.iter().position(|name| name == &column.name) {
            return (0, position);
        }
        match column.kind {
            ColumnKind::DescriptorFk => (1, 0),
            _ => (2, 0),
        }
    };

    table.columns.sort_by_key(group);
    move_aliases_after_dependencies(table);

    table
        .constraints
        .sort_by(|a, b| (a.kind_rank(), a.name()).cmp(&(b.kind_rank(), b.name())));
}

/// Moves every alias column after its canonical and presence columns. The
/// move preserves relative order otherwise and terminates because each pass
/// only moves columns later.
fn move_aliases_after_dependencies(table: &mut DbTableModel) {
    let len = table.columns.len();
    for _ in 0..len {
        let mut moved = false;
        for index in 0..table.columns.len() {
            let dependency_index = match &table.columns[index].storage {
                ColumnStorage::UnifiedAlias {
                    canonical,
                    presence,
                } => {
                    let canonical_index = position_of(table, canonical);
                    let presence_index = presence.as_ref().and_then(|name| {
                        let position = position_of(table, name);
                        position
                    });
                    match (canonical_index, presence_index) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (Some(a), None) => Some(a),
                        (None, any) => any,
                    }
                }
                ColumnStorage::Stored => None,
            };
            if let Some(dependency_index) = dependency_index {
                if index < dependency_index {
                    let column = table.columns.remove(index);
                    table.columns.insert(dependency_index, column);
                    moved = true;
                    break;
                }
            }
        }
        if !moved {
            break;
        }
    }
}

fn position_of(table: &DbTableModel, name: &DbColumnName) -> Option<usize> {
    table.columns.iter().position(|column| &column.name == name)
}
