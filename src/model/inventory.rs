//! Declarative index and trigger inventories.

use serde::Serialize;

use crate::model::names::{DbColumnName, DbIndexName, DbTableName, DbTriggerName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DbIndexKind {
    PrimaryKey,
    UniqueConstraint,
    ForeignKeySupport,
}

/// One index to create, keyed by `(table, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbIndexInfo {
    pub name: DbIndexName,
    pub table: DbTableName,
    pub key_columns: Vec<DbColumnName>,
    pub is_unique: bool,
    pub kind: DbIndexKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DbTriggerKind {
    /// Maintains document metadata stamps on write.
    DocumentStamping,
    /// Maintains referential identity projections on root tables.
    ReferentialIdentityMaintenance,
    /// Maintains the abstract identity table rows for subclass members.
    AbstractIdentityMaintenance,
    /// Mssql-only fallback that propagates identity value updates where
    /// cascading FKs are unavailable.
    IdentityPropagationFallback,
}

/// One trigger to create, keyed by `(table, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbTriggerInfo {
    pub name: DbTriggerName,
    pub table: DbTableName,
    pub kind: DbTriggerKind,
    pub key_columns: Vec<DbColumnName>,
    /// Identity columns the root stamping trigger projects for propagation;
    /// empty on every other trigger.
    pub identity_projection_columns: Vec<DbColumnName>,
}
