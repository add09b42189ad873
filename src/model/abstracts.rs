//! Abstract-resource outputs: identity tables and union views.

use serde::Serialize;

use crate::model::column::RelationalScalarType;
use crate::model::names::{DbColumnName, DbTableName};
use crate::model::table::DbTableModel;
use crate::schema::effective::ResourceKeyEntry;

/// The physical identity table backing an abstract resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbstractIdentityTableInfo {
    pub abstract_resource_key: ResourceKeyEntry,
    pub table: DbTableModel,
}

/// One output column of an abstract union view, with its widened type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbstractUnionViewOutputColumn {
    pub name: DbColumnName,
    pub scalar_type: RelationalScalarType,
}

/// A projection expression inside one union arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnionArmProjection {
    /// Projects a member column; carries the member's scalar type so emitters
    /// can CAST to the widened output type.
    SourceColumn {
        column: DbColumnName,
        scalar_type: Option<RelationalScalarType>,
    },
    /// A literal string, used for the discriminator.
    StringLiteral(String),
}

/// One member resource's arm of the union view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbstractUnionViewArm {
    pub member_resource_key: ResourceKeyEntry,
    pub source_table: DbTableName,
    /// Projections aligned positionally with the view's output columns.
    pub projections: Vec<UnionArmProjection>,
}

/// The read-side union view over all concrete members of an abstract
/// resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbstractUnionViewInfo {
    pub abstract_resource_key: ResourceKeyEntry,
    pub view: DbTableName,
    pub output_columns: Vec<AbstractUnionViewOutputColumn>,
    pub arms: Vec<AbstractUnionViewArm>,
}
