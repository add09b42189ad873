//! Cross-resource set passes, in execution order.

pub mod abstracts;
pub mod base;
pub mod constraints;
pub mod descriptors;
pub mod extensions;
pub mod indexes;
pub mod references;
pub mod shortening;
pub mod triggers;
pub mod unification;
