//! Trigger inventory: document stamping, referential identity maintenance,
//! abstract identity maintenance, and the identity propagation fallback for
//! dialects without cascading identity updates.

use std::collections::BTreeSet;

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::passes::constraints;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::inventory::{DbTriggerInfo, DbTriggerKind};
use crate::model::names::{DbColumnName, DbTriggerName, QualifiedResourceName};
use crate::model::resource::ResourceStorageKind;
use crate::naming;

pub struct TriggerInventoryPass;

impl RelationalModelSetPass for TriggerInventoryPass {
    fn name(&self) -> &'static str {
        "trigger-inventory"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let rules = context.dialect_rules();
        let cascade_updates = rules.supports_cascading_identity_updates();

        // Resources referenced by any document reference, directly or through
        // the abstract resource they subclass. Gates the propagation fallback
        // only.
        let mut referenced: BTreeSet<QualifiedResourceName> = BTreeSet::new();
        for entry in &context.resources {
            for binding in &entry.model.document_reference_bindings {
                referenced.insert(binding.target_resource.clone());
            }
        }
        for (resource, inputs) in &context.inputs_by_resource {
            if let Some(superclass) = &inputs.superclass {
                if referenced.contains(superclass) {
                    referenced.insert(resource.clone());
                }
            }
        }

        let mut triggers: Vec<DbTriggerInfo> = Vec::new();
        for entry in &context.resources {
            if entry.model.storage_kind != ResourceStorageKind::RelationalTables {
                continue;
            }
            let resource = &entry.model.resource;
            let root_table = entry.model.root_table().table.clone();

            let identity_projection_columns = match context.inputs_by_resource.get(resource) {
                Some(inputs) if !inputs.is_resource_extension => {
                    constraints::root_identity_columns(&entry.model, &inputs.identity_json_paths)?
                }
                _ => Vec::new(),
            };

            // Every physical table is stamped on write. Child tables key on
            // the root's propagated DocumentId; only the root stamp carries
            // the identity projection columns.
            for table in &entry.model.tables {
                let is_root = table.table == root_table;
                let key_columns = table
                    .key
                    .columns
                    .iter()
                    .find(|part| naming::is_document_id_column(&part.name))
                    .or_else(|| table.key.columns.first())
                    .map(|part| vec![part.name.clone()])
                    .unwrap_or_else(|| vec![DbColumnName::new(naming::DOCUMENT_ID)]);
                triggers.push(DbTriggerInfo {
                    name: DbTriggerName::new(
                        rules.shorten_identifier(&naming::trigger_name(&table.table, "Stamp")),
                    ),
                    table: table.table.clone(),
                    kind: DbTriggerKind::DocumentStamping,
                    key_columns,
                    identity_projection_columns: if is_root {
                        identity_projection_columns.clone()
                    } else {
                        Vec::new()
                    },
                });
            }

            let mut push_root = |purpose: &str, kind: DbTriggerKind| {
                triggers.push(DbTriggerInfo {
                    name: DbTriggerName::new(
                        rules.shorten_identifier(&naming::trigger_name(&root_table, purpose)),
                    ),
                    table: root_table.clone(),
                    kind,
                    key_columns: vec![DbColumnName::new(naming::DOCUMENT_ID)],
                    identity_projection_columns: Vec::new(),
                });
            };

            push_root(
                "ReferentialIdentity",
                DbTriggerKind::ReferentialIdentityMaintenance,
            );

            let is_abstract_member = context
                .inputs_by_resource
                .get(resource)
                .and_then(|inputs| inputs.superclass.as_ref())
                .map(|superclass| {
                    context
                        .abstract_identity_tables
                        .iter()
                        .any(|info| &info.abstract_resource_key.resource == superclass)
                })
                .unwrap_or(false);
            if is_abstract_member {
                push_root("AbstractIdentity", DbTriggerKind::AbstractIdentityMaintenance);
            }

            if !cascade_updates
                && entry.model.allow_identity_updates
                && referenced.contains(resource)
            {
                push_root("PropagateIdentity", DbTriggerKind::IdentityPropagationFallback);
            }
        }

        context.triggers.append(&mut triggers);
        debug!(pass = self.name(), triggers = context.triggers.len(), "derived trigger inventory");
        Ok(())
    }
}
