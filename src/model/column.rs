//! Column-level model types.

use serde::Serialize;

use crate::model::names::{DbColumnName, QualifiedResourceName};
use crate::path::JsonPathExpression;

/// The resolved relational scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationalScalarType {
    /// Variable-length string; `None` means unbounded (declared max length
    /// intentionally omitted).
    String { max_length: Option<u32> },
    Int32,
    Int64,
    Decimal { precision: u32, scale: u32 },
    Boolean,
    Date,
    DateTime,
    Time,
}

impl RelationalScalarType {
    /// Short type label used in error messages.
    pub fn label(&self) -> String {
        match self {
            RelationalScalarType::String { max_length: Some(n) } => format!("String({n})"),
            RelationalScalarType::String { max_length: None } => "String".to_string(),
            RelationalScalarType::Int32 => "Int32".to_string(),
            RelationalScalarType::Int64 => "Int64".to_string(),
            RelationalScalarType::Decimal { precision, scale } => {
                format!("Decimal({precision},{scale})")
            }
            RelationalScalarType::Boolean => "Boolean".to_string(),
            RelationalScalarType::Date => "Date".to_string(),
            RelationalScalarType::DateTime => "DateTime".to_string(),
            RelationalScalarType::Time => "Time".to_string(),
        }
    }
}

/// What role a column plays in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    /// Propagated parent key part (root document id or ancestor ordinal).
    ParentKeyPart,
    /// The collection table's own array position.
    Ordinal,
    /// A plain scalar value extracted from the document.
    Scalar,
    /// FK to another document's root table (or abstract identity table).
    DocumentFk,
    /// FK to the shared descriptor table.
    DescriptorFk,
}

/// How a column is physically stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnStorage {
    /// A real stored column.
    Stored,
    /// A key-unification alias: not stored, reads resolve to `canonical`;
    /// `presence` (when set) records whether the source path supplied a value.
    UnifiedAlias {
        canonical: DbColumnName,
        presence: Option<DbColumnName>,
    },
}

/// A single derived column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbColumnModel {
    pub name: DbColumnName,
    pub kind: ColumnKind,
    /// Resolved scalar type; `None` for document FK columns typed as the
    /// referenced key (always Int64 in practice, carried on the column).
    pub scalar_type: Option<RelationalScalarType>,
    pub is_nullable: bool,
    /// The document path this column extracts, when it extracts one.
    pub source_json_path: Option<JsonPathExpression>,
    /// The referenced resource for document and descriptor FK columns.
    pub target_resource: Option<QualifiedResourceName>,
    pub storage: ColumnStorage,
}

impl DbColumnModel {
    pub fn is_alias(&self) -> bool {
        matches!(self.storage, ColumnStorage::UnifiedAlias { .. })
    }

    /// The stored column name reads and FK definitions must use: the column
    /// itself when `Stored`, its canonical column when aliased.
    pub fn stored_name(&self) -> &DbColumnName {
        match &self.storage {
            ColumnStorage::Stored => &self.name,
            ColumnStorage::UnifiedAlias { canonical, .. } => canonical,
        }
    }
}
