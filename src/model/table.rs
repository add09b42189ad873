//! Table-level model types: keys, constraints, and the table model itself.

use serde::Serialize;

use crate::model::column::{ColumnKind, DbColumnModel};
use crate::model::names::{DbColumnName, DbTableName};
use crate::path::JsonPathExpression;

/// A key part: column name plus its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbKeyColumn {
    pub name: DbColumnName,
    pub kind: ColumnKind,
}

/// A table's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableKey {
    pub name: String,
    pub columns: Vec<DbKeyColumn>,
}

impl TableKey {
    pub fn column_names(&self) -> Vec<DbColumnName> {
        self.columns.iter().map(|part| part.name.clone()).collect()
    }

    pub fn contains(&self, column: &DbColumnName) -> bool {
        self.columns.iter().any(|part| &part.name == column)
    }
}

/// Referential action on a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferentialAction {
    NoAction,
    Cascade,
}

/// A declarative table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TableConstraint {
    Unique {
        name: String,
        columns: Vec<DbColumnName>,
    },
    ForeignKey {
        name: String,
        columns: Vec<DbColumnName>,
        target_table: DbTableName,
        target_columns: Vec<DbColumnName>,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
    /// The FK column and its dependent projected columns must be all null or
    /// all non-null.
    AllOrNoneNullability {
        name: String,
        fk_column: DbColumnName,
        dependent_columns: Vec<DbColumnName>,
    },
    /// A Boolean presence column must be NULL or TRUE.
    NullOrTrue {
        name: String,
        column: DbColumnName,
    },
}

impl TableConstraint {
    pub fn name(&self) -> &str {
        match self {
            TableConstraint::Unique { name, .. }
            | TableConstraint::ForeignKey { name, .. }
            | TableConstraint::AllOrNoneNullability { name, .. }
            | TableConstraint::NullOrTrue { name, .. } => name,
        }
    }

    /// Fixed kind rank used for canonical constraint ordering.
    pub fn kind_rank(&self) -> u8 {
        match self {
            TableConstraint::Unique { .. } => 0,
            TableConstraint::ForeignKey { .. } => 1,
            TableConstraint::AllOrNoneNullability { .. } => 2,
            TableConstraint::NullOrTrue { .. } => 3,
        }
    }
}

/// A fully-derived table: identity, document scope, key, columns, and
/// constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbTableModel {
    pub table: DbTableName,
    /// The document scope this table flattens (`$` for root tables, an
    /// array-element path for collection tables, an `_ext` object path for
    /// extension tables).
    pub json_scope: JsonPathExpression,
    pub key: TableKey,
    pub columns: Vec<DbColumnModel>,
    pub constraints: Vec<TableConstraint>,
}

impl DbTableModel {
    pub fn column(&self, name: &DbColumnName) -> Option<&DbColumnModel> {
        self.columns.iter().find(|column| &column.name == name)
    }

    pub fn column_mut(&mut self, name: &DbColumnName) -> Option<&mut DbColumnModel> {
        self.columns.iter_mut().find(|column| &column.name == name)
    }

    /// The column extracting `path`, if any.
    pub fn column_by_source_path(&self, path: &JsonPathExpression) -> Option<&DbColumnModel> {
        self.columns
            .iter()
            .find(|column| column.source_json_path.as_ref() == Some(path))
    }
}
