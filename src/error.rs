//! Error types for relmodel

use thiserror::Error;

/// Errors that can occur during relational model derivation.
///
/// Every variant carries a fully-constructed message naming the offending
/// resource, path, or identifier, so callers can surface derivation failures
/// without additional context.
#[derive(Error, Debug)]
pub enum DerivationError {
    #[error("JSONPath parse error in '{path}': {message}")]
    PathParse { path: String, message: String },

    #[error("Invalid schema shape: {message}")]
    SchemaShape { message: String },

    #[error("Mapping inconsistency: {message}")]
    MappingInconsistency { message: String },

    #[error("Cross-resource resolution failure: {message}")]
    CrossResourceResolution { message: String },

    #[error("Key unification conflict: {message}")]
    KeyUnification { message: String },

    #[error("Identifier collision after shortening: {message}")]
    IdentifierCollision { message: String },
}

impl DerivationError {
    pub(crate) fn schema_shape(message: impl Into<String>) -> Self {
        DerivationError::SchemaShape {
            message: message.into(),
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        DerivationError::MappingInconsistency {
            message: message.into(),
        }
    }

    pub(crate) fn resolution(message: impl Into<String>) -> Self {
        DerivationError::CrossResourceResolution {
            message: message.into(),
        }
    }

    pub(crate) fn unification(message: impl Into<String>) -> Self {
        DerivationError::KeyUnification {
            message: message.into(),
        }
    }

    pub(crate) fn collision(message: impl Into<String>) -> Self {
        DerivationError::IdentifierCollision {
            message: message.into(),
        }
    }
}
