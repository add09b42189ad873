//! Effective schema set assembly and raw document access.

pub mod effective;
pub mod raw;

pub use effective::{
    EffectiveProjectSchema, EffectiveSchemaInfo, EffectiveSchemaSet, ResourceKeyEntry,
};
