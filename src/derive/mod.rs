//! The derivation pipeline: per-resource steps plus cross-resource set
//! passes executed in a fixed order over a shared builder context.

pub mod context;
pub mod passes;
pub mod resource;

pub use context::RelationalModelSetBuilderContext;

use crate::error::DerivationError;

/// One cross-resource set pass.
pub(crate) trait RelationalModelSetPass {
    fn name(&self) -> &'static str;
    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError>;
}

/// The fixed pass order. Later passes depend on the outputs of earlier ones:
/// references bind against abstract identity tables, unification rewrites
/// bound columns, constraints resolve unified storage, shortening renames
/// everything before the inventories derive from the final names.
pub(crate) fn default_passes() -> Vec<Box<dyn RelationalModelSetPass>> {
    vec![
        Box::new(passes::base::BaseResourceDerivationPass),
        Box::new(passes::descriptors::DescriptorTableMappingPass),
        Box::new(passes::extensions::ExtensionTableDerivationPass),
        Box::new(passes::abstracts::AbstractIdentityAndUnionViewPass),
        Box::new(passes::references::ReferenceBindingPass),
        Box::new(passes::unification::KeyUnificationPass),
        Box::new(passes::constraints::ConstraintDerivationPass),
        Box::new(passes::shortening::IdentifierShorteningPass),
        Box::new(passes::indexes::IndexInventoryPass),
        Box::new(passes::triggers::TriggerInventoryPass),
    ]
}
