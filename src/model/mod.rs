//! The derived relational data model.
//!
//! Pure data types only; all derivation logic lives in [`crate::derive`].

pub mod abstracts;
pub mod column;
pub mod inventory;
pub mod model_set;
pub mod names;
pub mod resource;
pub mod table;

pub use abstracts::{
    AbstractIdentityTableInfo, AbstractUnionViewArm, AbstractUnionViewInfo,
    AbstractUnionViewOutputColumn, UnionArmProjection,
};
pub use column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
pub use inventory::{DbIndexInfo, DbIndexKind, DbTriggerInfo, DbTriggerKind};
pub use model_set::{DerivedRelationalModelSet, ProjectSchemaInfo};
pub use names::{
    DbColumnName, DbIndexName, DbSchemaName, DbTableName, DbTriggerName, QualifiedResourceName,
};
pub use resource::{
    ConcreteResourceModel, DescriptorEdgeSource, DocumentReferenceBinding,
    EqualityConstraintEndpoint, EqualityConstraintIgnoredReason, KeyUnificationClass,
    KeyUnificationEqualityConstraint, ReferenceIdentityBinding, RelationalResourceModel,
    ResourceStorageKind,
};
pub use table::{DbKeyColumn, DbTableModel, ReferentialAction, TableConstraint, TableKey};
