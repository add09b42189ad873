//! Descriptor mapping: every descriptor resource maps onto the shared
//! `dms.Descriptor` table instead of deriving tables of its own.

use tracing::debug;

use crate::derive::context::RelationalModelSetBuilderContext;
use crate::derive::resource::columns::shared_descriptor_table;
use crate::derive::RelationalModelSetPass;
use crate::error::DerivationError;
use crate::model::column::{ColumnKind, ColumnStorage, DbColumnModel, RelationalScalarType};
use crate::model::names::DbColumnName;
use crate::model::resource::{ConcreteResourceModel, RelationalResourceModel, ResourceStorageKind};
use crate::model::table::{DbKeyColumn, DbTableModel, TableConstraint, TableKey};
use crate::naming;
use crate::path::JsonPathExpression;

/// Maximum descriptor URI length: 255 for the namespace, '#', and 50 for the
/// code value.
const DESCRIPTOR_URI_MAX_LENGTH: u32 = 306;
const DESCRIPTOR_DISCRIMINATOR_MAX_LENGTH: u32 = 128;

pub struct DescriptorTableMappingPass;

impl RelationalModelSetPass for DescriptorTableMappingPass {
    fn name(&self) -> &'static str {
        "descriptor-table-mapping"
    }

    fn run(&self, context: &mut RelationalModelSetBuilderContext) -> Result<(), DerivationError> {
        let descriptor_resources: Vec<_> = context
            .inputs_by_resource
            .values()
            .filter(|inputs| inputs.is_descriptor)
            .map(|inputs| inputs.resource.clone())
            .collect();

        for resource in &descriptor_resources {
            let resource_key = context.resource_key(resource)?;
            let physical_schema = context.physical_schema_for_project(&resource.project_name)?;
            context.resources.push(ConcreteResourceModel {
                resource_key,
                model: RelationalResourceModel {
                    resource: resource.clone(),
                    physical_schema,
                    storage_kind: ResourceStorageKind::SharedDescriptorTable,
                    tables: vec![shared_descriptor_table_model()],
                    document_reference_bindings: Vec::new(),
                    descriptor_edge_sources: Vec::new(),
                    key_unification_classes: Vec::new(),
                    key_unification_equality_constraints: Vec::new(),
                    allow_identity_updates: false,
                },
            });
        }

        debug!(
            pass = self.name(),
            descriptors = descriptor_resources.len(),
            "mapped descriptor resources onto the shared table"
        );
        Ok(())
    }
}

/// The fixed shape of the shared descriptor table: `DocumentId` key, the
/// descriptor `Uri`, and the `Discriminator` naming the concrete descriptor
/// resource, unique together.
fn shared_descriptor_table_model() -> DbTableModel {
    let table = shared_descriptor_table();
    let uri = DbColumnName::new(naming::DESCRIPTOR_URI);
    let discriminator = DbColumnName::new(naming::DISCRIMINATOR);

    DbTableModel {
        key: TableKey {
            name: naming::primary_key_name(&table),
            columns: vec![DbKeyColumn {
                name: DbColumnName::new(naming::DOCUMENT_ID),
                kind: ColumnKind::ParentKeyPart,
            }],
        },
        columns: vec![
            DbColumnModel {
                name: DbColumnName::new(naming::DOCUMENT_ID),
                kind: ColumnKind::ParentKeyPart,
                scalar_type: Some(RelationalScalarType::Int64),
                is_nullable: false,
                source_json_path: None,
                target_resource: None,
                storage: ColumnStorage::Stored,
            },
            DbColumnModel {
                name: uri.clone(),
                kind: ColumnKind::Scalar,
                scalar_type: Some(RelationalScalarType::String {
                    max_length: Some(DESCRIPTOR_URI_MAX_LENGTH),
                }),
                is_nullable: false,
                source_json_path: None,
                target_resource: None,
                storage: ColumnStorage::Stored,
            },
            DbColumnModel {
                name: discriminator.clone(),
                kind: ColumnKind::Scalar,
                scalar_type: Some(RelationalScalarType::String {
                    max_length: Some(DESCRIPTOR_DISCRIMINATOR_MAX_LENGTH),
                }),
                is_nullable: false,
                source_json_path: None,
                target_resource: None,
                storage: ColumnStorage::Stored,
            },
        ],
        constraints: vec![TableConstraint::Unique {
            name: naming::unique_name(&table, &[uri.clone(), discriminator.clone()]),
            columns: vec![uri, discriminator],
        }],
        table,
        json_scope: JsonPathExpression::root(),
    }
}
