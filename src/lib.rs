//! relmodel: derives fully-resolved relational schemas from JSON-Schema API
//! descriptions.
//!
//! The input is an effective schema set: one API schema document per project
//! (core plus extensions). The output is a [`DerivedRelationalModelSet`]
//! holding every table, column, constraint, index, and trigger a database
//! needs to store and query documents relationally, for either PostgreSQL or
//! SQL Server.

pub mod derive;
pub mod dialect;
pub mod error;
pub mod model;
pub mod naming;
pub mod path;
pub mod schema;

use tracing::debug_span;

pub use dialect::SqlDialect;
pub use error::DerivationError;
pub use model::DerivedRelationalModelSet;
pub use schema::{EffectiveProjectSchema, EffectiveSchemaSet};

/// Options for deriving a relational model set.
#[derive(Debug, Clone, Copy)]
pub struct DeriveOptions {
    /// Target SQL dialect; controls identifier length limits and whether
    /// identity updates cascade through FKs.
    pub dialect: SqlDialect,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::Pgsql,
        }
    }
}

/// Derives the complete relational model set for an effective schema set.
///
/// The derivation is deterministic: the same schema set and options always
/// produce an identical model set, regardless of project or property order in
/// the input documents.
pub fn derive_model_set(
    schema_set: EffectiveSchemaSet,
    options: &DeriveOptions,
) -> Result<DerivedRelationalModelSet, DerivationError> {
    let mut context =
        derive::RelationalModelSetBuilderContext::new(schema_set, options.dialect)?;
    for pass in derive::default_passes() {
        let span = debug_span!("set_pass", pass = pass.name());
        let _guard = span.enter();
        pass.run(&mut context)?;
    }
    context.build_result()
}
