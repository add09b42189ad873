//! Deterministic naming conventions for physical schemas, tables, columns,
//! constraints, indexes, and triggers.
//!
//! These helpers apply a restricted, cross-database-safe identifier policy:
//! schema names are normalized to lowercase ASCII letters/digits with a
//! leading letter; property and collection segments become PascalCase
//! identifiers; collection tables and key parts follow the root + ordinals
//! conventions.

use crate::model::names::{DbColumnName, DbSchemaName, DbTableName};
use crate::path::JsonPathSegment;

/// The standard `DocumentId` column name used by root tables.
pub const DOCUMENT_ID: &str = "DocumentId";

/// The standard `Ordinal` column name used by collection tables to preserve
/// array ordering.
pub const ORDINAL: &str = "Ordinal";

/// The shared descriptor table (`dms.Descriptor`) location and columns.
pub const DESCRIPTOR_SCHEMA: &str = "dms";
pub const DESCRIPTOR_TABLE: &str = "Descriptor";
pub const DESCRIPTOR_URI: &str = "Uri";
pub const DISCRIMINATOR: &str = "Discriminator";

const DESCRIPTOR_ID_SUFFIX: &str = "_DescriptorId";
const DOCUMENT_ID_SUFFIX: &str = "_DocumentId";

/// Normalizes a project endpoint name (e.g. `ed-fi`) into a physical schema
/// identifier: lowercase ASCII letters/digits only, with `p` prepended when
/// the result is empty or starts with a non-letter.
pub fn normalize_schema_name(project_endpoint_name: &str) -> DbSchemaName {
    let mut normalized = String::with_capacity(project_endpoint_name.len());
    for character in project_endpoint_name.chars() {
        if character.is_ascii_alphanumeric() {
            normalized.push(character.to_ascii_lowercase());
        }
    }
    if normalized.is_empty() || !normalized.starts_with(|c: char| c.is_ascii_lowercase()) {
        normalized.insert(0, 'p');
    }
    DbSchemaName::new(normalized)
}

/// Converts an arbitrary identifier into PascalCase by removing separators and
/// capitalizing segment starts.
pub fn to_pascal_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut next_upper = true;
    for character in value.chars() {
        if character.is_alphanumeric() {
            if next_upper {
                result.extend(character.to_uppercase());
            } else {
                result.push(character);
            }
            next_upper = false;
        } else {
            next_upper = true;
        }
    }
    result
}

/// Applies the singularization rule for collection property names.
pub fn singularize_collection_segment(value: &str) -> String {
    let lower = value.to_lowercase();
    if lower.ends_with("ies") {
        let mut result = value[..value.len() - 3].to_string();
        result.push('y');
        return result;
    }
    if lower.ends_with("ches")
        || lower.ends_with("shes")
        || lower.ends_with("xes")
        || lower.ends_with("zes")
        || lower.ends_with("ses")
    {
        return value[..value.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return value[..value.len() - 1].to_string();
    }
    value.to_string()
}

/// The base name for a collection table: singularized, PascalCased collection
/// property name.
pub fn collection_base_name(collection_property_name: &str) -> String {
    to_pascal_case(&singularize_collection_segment(collection_property_name))
}

/// PascalCase column base name for a run of relative path segments, skipping
/// array wildcards (e.g. `name.firstName` becomes `NameFirstName`).
pub fn column_base_for_segments(segments: &[JsonPathSegment]) -> String {
    let mut base = String::new();
    for segment in segments {
        if let JsonPathSegment::Property(name) = segment {
            base.push_str(&to_pascal_case(name));
        }
    }
    base
}

/// The root document id key part on a collection table, e.g.
/// `School_DocumentId`.
pub fn root_document_id_column(root_base_name: &str) -> DbColumnName {
    DbColumnName::new(format!("{root_base_name}{DOCUMENT_ID_SUFFIX}"))
}

/// An ancestor collection ordinal key part, e.g. `AddressOrdinal`.
pub fn parent_ordinal_column(parent_collection_base_name: &str) -> DbColumnName {
    DbColumnName::new(format!("{parent_collection_base_name}{ORDINAL}"))
}

/// A descriptor FK column, e.g. `SchoolTypeDescriptor_DescriptorId`.
pub fn descriptor_id_column(descriptor_base_name: &str) -> DbColumnName {
    DbColumnName::new(format!("{descriptor_base_name}{DESCRIPTOR_ID_SUFFIX}"))
}

/// A document reference FK column, e.g. `LocalEducationAgency_DocumentId`.
pub fn reference_document_id_column(reference_base_name: &str) -> DbColumnName {
    DbColumnName::new(format!("{reference_base_name}{DOCUMENT_ID_SUFFIX}"))
}

/// A reference-projected identity column, e.g. `Person_NameFirstName`.
pub fn reference_identity_column(reference_base_name: &str, part_base: &str) -> DbColumnName {
    DbColumnName::new(format!("{reference_base_name}_{part_base}"))
}

/// The synthetic presence column paired with an optional unified alias, e.g.
/// `BeginDate_Present`.
pub fn presence_column(column: &DbColumnName) -> DbColumnName {
    DbColumnName::new(format!("{}_Present", column.as_str()))
}

/// Whether a column name represents a document id, either the root
/// `DocumentId` or a prefixed variant such as `School_DocumentId`.
pub fn is_document_id_column(column: &DbColumnName) -> bool {
    column.as_str() == DOCUMENT_ID || column.as_str().ends_with(DOCUMENT_ID_SUFFIX)
}

/// Strips the `_DescriptorId` suffix to recover a descriptor base name.
pub fn descriptor_base_of(column: &DbColumnName) -> String {
    column
        .as_str()
        .strip_suffix(DESCRIPTOR_ID_SUFFIX)
        .unwrap_or(column.as_str())
        .to_string()
}

/// Strips the `_DocumentId` suffix to recover a reference base name.
pub fn reference_base_of(column: &DbColumnName) -> String {
    column
        .as_str()
        .strip_suffix(DOCUMENT_ID_SUFFIX)
        .unwrap_or(column.as_str())
        .to_string()
}

fn joined(prefix: &str, table: &DbTableName, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return format!("{prefix}_{}", table.name());
    }
    format!("{prefix}_{}_{}", table.name(), tokens.join("_"))
}

fn column_tokens(columns: &[DbColumnName]) -> Vec<String> {
    columns
        .iter()
        .map(|column| column.as_str().to_string())
        .collect()
}

/// `PK_{Table}`.
pub fn primary_key_name(table: &DbTableName) -> String {
    format!("PK_{}", table.name())
}

/// `UX_{Table}_{Col1}_{Col2}...`.
pub fn unique_name(table: &DbTableName, columns: &[DbColumnName]) -> String {
    joined("UX", table, &column_tokens(columns))
}

/// `FK_{Table}_{token...}`.
pub fn foreign_key_name(table: &DbTableName, tokens: &[String]) -> String {
    joined("FK", table, tokens)
}

/// `CK_{Table}_{Base}_AllNone`.
pub fn all_or_none_name(table: &DbTableName, reference_base_name: &str) -> String {
    joined(
        "CK",
        table,
        &[reference_base_name.to_string(), "AllNone".to_string()],
    )
}

/// `CK_{Table}_{Column}_NullOrTrue`.
pub fn null_or_true_name(table: &DbTableName, column: &DbColumnName) -> String {
    joined(
        "CK",
        table,
        &[column.as_str().to_string(), "NullOrTrue".to_string()],
    )
}

/// `IX_{Table}_{Col1}_{Col2}...`.
pub fn index_name(table: &DbTableName, columns: &[DbColumnName]) -> String {
    joined("IX", table, &column_tokens(columns))
}

/// `TR_{Table}_{Purpose}`.
pub fn trigger_name(table: &DbTableName, purpose: &str) -> String {
    format!("TR_{}_{purpose}", table.name())
}
