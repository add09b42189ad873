//! Step 1: extract and validate per-resource derivation inputs from the raw
//! resource schema document.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::DerivationError;
use crate::model::names::QualifiedResourceName;
use crate::path::JsonPathExpression;
use crate::schema::raw;

/// Decimal precision metadata for one document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalInfo {
    pub total_digits: u32,
    pub decimal_places: u32,
}

/// One `referenceJsonPaths` pair: target-side identity path and the
/// document-side path carrying its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceJsonPathPair {
    pub identity_json_path: JsonPathExpression,
    pub reference_json_path: JsonPathExpression,
}

/// One `documentPathsMapping` entry, shape-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPathKind {
    Scalar {
        path: JsonPathExpression,
    },
    Descriptor {
        path: JsonPathExpression,
        target: QualifiedResourceName,
    },
    Reference {
        target: QualifiedResourceName,
        /// The enclosing reference object, computed from the shared prefix of
        /// all `referenceJsonPath`s.
        reference_object_path: JsonPathExpression,
        reference_json_paths: Vec<ReferenceJsonPathPair>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPathMapping {
    pub logical_name: String,
    pub is_part_of_identity: bool,
    pub is_required: bool,
    pub kind: DocumentPathKind,
}

/// One declared array uniqueness constraint (possibly nested).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayUniquenessConstraint {
    pub base_path: Option<JsonPathExpression>,
    pub paths: Vec<JsonPathExpression>,
    pub nested: Vec<ArrayUniquenessConstraint>,
}

/// One declared equality constraint between two document paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityConstraintInput {
    pub source_json_path: JsonPathExpression,
    pub target_json_path: JsonPathExpression,
}

/// An `_ext` attachment point discovered in the insert schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSite {
    /// The table scope owning the site (`$` or an array-element path).
    pub owning_scope: JsonPathExpression,
    /// The `_ext` object path under the owning scope.
    pub extension_path: JsonPathExpression,
    /// Extension project keys declared under `_ext`, sorted.
    pub project_keys: Vec<String>,
}

/// Everything the derivation pipeline needs for one resource, extracted once
/// from the raw resource schema document.
#[derive(Debug, Clone)]
pub struct ResourceInputs {
    pub resource: QualifiedResourceName,
    /// Key of this resource in `resourceSchemas` (the plural endpoint name).
    pub endpoint_key: String,
    pub project_endpoint_name: String,
    pub is_descriptor: bool,
    pub is_resource_extension: bool,
    pub is_subclass: bool,
    pub superclass: Option<QualifiedResourceName>,
    pub superclass_identity_json_path: Option<JsonPathExpression>,
    pub allow_identity_updates: bool,
    pub identity_json_paths: Vec<JsonPathExpression>,
    /// Mappings in logical-name order.
    pub document_paths: Vec<DocumentPathMapping>,
    pub array_uniqueness_constraints: Vec<ArrayUniquenessConstraint>,
    pub equality_constraints: Vec<EqualityConstraintInput>,
    /// Canonical path to decimal metadata.
    pub decimal_infos: BTreeMap<String, DecimalInfo>,
    /// Canonical paths where string `maxLength` may be omitted.
    pub string_max_length_omission_paths: BTreeSet<String>,
    /// Canonical path to overriding base name (`relational.nameOverrides`).
    pub name_overrides: BTreeMap<String, String>,
    pub json_schema_for_insert: Value,
    /// Filled by the extension-site discovery step.
    pub extension_sites: Vec<ExtensionSite>,
}

impl ResourceInputs {
    /// The reference mapping owning `path` (a reference object path prefix of
    /// it), if any.
    pub fn reference_for_path(&self, path: &JsonPathExpression) -> Option<&DocumentPathMapping> {
        self.document_paths.iter().find(|mapping| {
            matches!(
                &mapping.kind,
                DocumentPathKind::Reference { reference_object_path, .. }
                    if reference_object_path.is_prefix_of(path)
            )
        })
    }
}

/// Extracts and validates the derivation inputs for one resource.
pub fn extract_inputs(
    project_name: &str,
    project_endpoint_name: &str,
    endpoint_key: &str,
    resource_schema: &Value,
) -> Result<ResourceInputs, DerivationError> {
    let what = format!("resourceSchemas.{endpoint_key}");
    let schema = raw::require_object(resource_schema, &what)?;

    let resource_name = raw::require_str(schema, "resourceName", &what)?;
    let resource = QualifiedResourceName::new(project_name, resource_name);

    let is_descriptor = raw::require_bool(schema, "isDescriptor", &what)?;
    let is_resource_extension = raw::optional_bool(schema, "isResourceExtension", false, &what)?;
    let is_subclass = raw::optional_bool(schema, "isSubclass", false, &what)?;
    let allow_identity_updates = raw::optional_bool(schema, "allowIdentityUpdates", false, &what)?;

    let superclass = if is_subclass {
        let superclass_project = raw::require_str(schema, "superclassProjectName", &what)?;
        let superclass_resource = raw::require_str(schema, "superclassResourceName", &what)?;
        Some(QualifiedResourceName::new(
            superclass_project,
            superclass_resource,
        ))
    } else {
        None
    };

    let superclass_identity_json_path =
        match raw::optional_str(schema, "superclassIdentityJsonPath", &what)? {
            Some(path) => Some(JsonPathExpression::compile(path)?),
            None => None,
        };

    let mut identity_json_paths = Vec::new();
    if let Some(paths) = raw::optional_array(schema, "identityJsonPaths", &what)? {
        for path in paths {
            let path = path.as_str().ok_or_else(|| {
                DerivationError::schema_shape(format!("{what}.identityJsonPaths must be strings"))
            })?;
            identity_json_paths.push(JsonPathExpression::compile(path)?);
        }
    }

    let document_paths = extract_document_paths(schema, &resource, &what)?;
    validate_identity_paths(&resource, &identity_json_paths, &document_paths)?;

    let array_uniqueness_constraints = match raw::optional_array(
        schema,
        "arrayUniquenessConstraints",
        &what,
    )? {
        Some(entries) => entries
            .iter()
            .map(|entry| extract_array_uniqueness(entry, &what))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let mut equality_constraints = Vec::new();
    if let Some(entries) = raw::optional_array(schema, "equalityConstraints", &what)? {
        for entry in entries {
            let entry = raw::require_object(entry, &format!("{what}.equalityConstraints[]"))?;
            equality_constraints.push(EqualityConstraintInput {
                source_json_path: JsonPathExpression::compile(raw::require_str(
                    entry,
                    "sourceJsonPath",
                    &what,
                )?)?,
                target_json_path: JsonPathExpression::compile(raw::require_str(
                    entry,
                    "targetJsonPath",
                    &what,
                )?)?,
            });
        }
    }

    let mut decimal_infos = BTreeMap::new();
    if let Some(entries) = raw::optional_array(schema, "decimalPropertyValidationInfos", &what)? {
        for entry in entries {
            let entry =
                raw::require_object(entry, &format!("{what}.decimalPropertyValidationInfos[]"))?;
            let path = JsonPathExpression::compile(raw::require_str(entry, "path", &what)?)?;
            let total_digits = raw::require_u32(entry, "totalDigits", &what)?;
            let decimal_places = raw::optional_u32(entry, "decimalPlaces", &what)?.unwrap_or(0);
            if total_digits == 0 || decimal_places > total_digits {
                return Err(DerivationError::schema_shape(format!(
                    "decimal property validation info must have positive totalDigits and decimalPlaces <= totalDigits at {}",
                    path.canonical()
                )));
            }
            decimal_infos.insert(
                path.canonical().to_string(),
                DecimalInfo {
                    total_digits,
                    decimal_places,
                },
            );
        }
    }

    let mut string_max_length_omission_paths = BTreeSet::new();
    if let Some(entries) = raw::optional_array(schema, "stringMaxLengthOmissionPaths", &what)? {
        for entry in entries {
            let path = entry.as_str().ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "{what}.stringMaxLengthOmissionPaths must be strings"
                ))
            })?;
            string_max_length_omission_paths
                .insert(JsonPathExpression::compile(path)?.canonical().to_string());
        }
    }

    let mut name_overrides = BTreeMap::new();
    if let Some(relational) = raw::optional_object(schema, "relational", &what)? {
        if let Some(overrides) =
            raw::optional_object(relational, "nameOverrides", &format!("{what}.relational"))?
        {
            for (path, name) in overrides {
                let name = name.as_str().ok_or_else(|| {
                    DerivationError::schema_shape(format!(
                        "{what}.relational.nameOverrides values must be strings"
                    ))
                })?;
                let path = JsonPathExpression::compile(path)?;
                validate_name_override(&resource, &document_paths, &path)?;
                name_overrides.insert(path.canonical().to_string(), name.to_string());
            }
        }
    }

    let json_schema_for_insert = raw::require_member(schema, "jsonSchemaForInsert", &what)?.clone();

    Ok(ResourceInputs {
        resource,
        endpoint_key: endpoint_key.to_string(),
        project_endpoint_name: project_endpoint_name.to_string(),
        is_descriptor,
        is_resource_extension,
        is_subclass,
        superclass,
        superclass_identity_json_path,
        allow_identity_updates,
        identity_json_paths,
        document_paths,
        array_uniqueness_constraints,
        equality_constraints,
        decimal_infos,
        string_max_length_omission_paths,
        name_overrides,
        json_schema_for_insert,
        extension_sites: Vec::new(),
    })
}

fn extract_document_paths(
    schema: &serde_json::Map<String, Value>,
    resource: &QualifiedResourceName,
    what: &str,
) -> Result<Vec<DocumentPathMapping>, DerivationError> {
    let mut mappings = Vec::new();
    let Some(document_paths) = raw::optional_object(schema, "documentPathsMapping", what)? else {
        return Ok(mappings);
    };

    // Key-sorted iteration fixes logical-name order.
    for (logical_name, entry) in document_paths {
        let entry_what = format!("{what}.documentPathsMapping.{logical_name}");
        let entry = raw::require_object(entry, &entry_what)?;

        let is_reference = raw::require_bool(entry, "isReference", &entry_what)?;
        let is_descriptor = raw::optional_bool(entry, "isDescriptor", false, &entry_what)?;
        let is_part_of_identity =
            raw::optional_bool(entry, "isPartOfIdentity", false, &entry_what)?;
        let is_required = raw::optional_bool(entry, "isRequired", false, &entry_what)?;

        let kind = if is_reference && is_descriptor {
            let path = JsonPathExpression::compile(raw::require_str(entry, "path", &entry_what)?)?;
            DocumentPathKind::Descriptor {
                path,
                target: QualifiedResourceName::new(
                    raw::require_str(entry, "projectName", &entry_what)?,
                    raw::require_str(entry, "resourceName", &entry_what)?,
                ),
            }
        } else if is_reference {
            let target = QualifiedResourceName::new(
                raw::require_str(entry, "projectName", &entry_what)?,
                raw::require_str(entry, "resourceName", &entry_what)?,
            );
            let pairs = raw::require_array(entry, "referenceJsonPaths", &entry_what)?;
            let mut reference_json_paths = Vec::new();
            for pair in pairs {
                let pair = raw::require_object(pair, &format!("{entry_what}.referenceJsonPaths[]"))?;
                reference_json_paths.push(ReferenceJsonPathPair {
                    identity_json_path: JsonPathExpression::compile(raw::require_str(
                        pair,
                        "identityJsonPath",
                        &entry_what,
                    )?)?,
                    reference_json_path: JsonPathExpression::compile(raw::require_str(
                        pair,
                        "referenceJsonPath",
                        &entry_what,
                    )?)?,
                });
            }
            let reference_object_path =
                reference_object_path(resource, logical_name, &reference_json_paths)?;
            DocumentPathKind::Reference {
                target,
                reference_object_path,
                reference_json_paths,
            }
        } else {
            let path = JsonPathExpression::compile(raw::require_str(entry, "path", &entry_what)?)?;
            DocumentPathKind::Scalar { path }
        };

        mappings.push(DocumentPathMapping {
            logical_name: logical_name.clone(),
            is_part_of_identity,
            is_required,
            kind,
        });
    }

    Ok(mappings)
}

/// Computes the reference object path as the shared segment prefix of all
/// `referenceJsonPath`s, rejecting inconsistent prefixes.
fn reference_object_path(
    resource: &QualifiedResourceName,
    logical_name: &str,
    pairs: &[ReferenceJsonPathPair],
) -> Result<JsonPathExpression, DerivationError> {
    let inconsistent = || {
        DerivationError::mapping(format!(
            "reference '{logical_name}' on resource {resource} must declare referenceJsonPaths with a single consistent path prefix"
        ))
    };

    let first = pairs.first().ok_or_else(inconsistent)?;
    let mut prefix_len = first.reference_json_path.segments().len();
    for pair in &pairs[1..] {
        let segments = pair.reference_json_path.segments();
        let mut shared = 0;
        while shared < prefix_len
            && shared < segments.len()
            && first.reference_json_path.segments()[shared] == segments[shared]
        {
            shared += 1;
        }
        prefix_len = shared;
    }

    // A lone pair's object path is the parent of its value path; with several
    // pairs the shared prefix is already strictly shorter than each path.
    if pairs
        .iter()
        .any(|pair| pair.reference_json_path.segments().len() == prefix_len)
    {
        prefix_len = prefix_len.saturating_sub(1);
    }

    if prefix_len == 0 {
        return Err(inconsistent());
    }

    let object_path = JsonPathExpression::from_segments(
        first.reference_json_path.segments()[..prefix_len].to_vec(),
    );

    for pair in pairs {
        if !object_path.is_prefix_of(&pair.reference_json_path) {
            return Err(inconsistent());
        }
    }

    Ok(object_path)
}

/// An override key must name a reference object path (renaming the reference
/// base) or one of that reference's identity value paths (renaming one
/// projected column). Everything else fails fast.
fn validate_name_override(
    resource: &QualifiedResourceName,
    document_paths: &[DocumentPathMapping],
    path: &JsonPathExpression,
) -> Result<(), DerivationError> {
    for mapping in document_paths {
        let DocumentPathKind::Reference {
            reference_object_path,
            reference_json_paths,
            ..
        } = &mapping.kind
        else {
            continue;
        };
        if reference_object_path == path {
            return Ok(());
        }
        if reference_object_path.is_prefix_of(path) {
            if reference_json_paths
                .iter()
                .any(|pair| &pair.reference_json_path == path)
            {
                return Ok(());
            }
            return Err(DerivationError::mapping(format!(
                "relational.nameOverrides path '{}' on resource {resource} is not an identity path of reference '{}'. Only reference identity paths may be overridden",
                path.canonical(),
                mapping.logical_name
            )));
        }
    }
    Err(DerivationError::mapping(format!(
        "relational.nameOverrides path '{}' on resource {resource} does not target a document reference; overrides rename reference paths only",
        path.canonical()
    )))
}

/// Cross-checks `identityJsonPaths` against the mapping entries: every
/// declared identity path must be supplied by a mapping, and every mapping
/// flagged as part of the identity must contribute at least one identity path.
fn validate_identity_paths(
    resource: &QualifiedResourceName,
    identity_json_paths: &[JsonPathExpression],
    document_paths: &[DocumentPathMapping],
) -> Result<(), DerivationError> {
    let mut supplied: BTreeSet<&str> = BTreeSet::new();
    for mapping in document_paths {
        match &mapping.kind {
            DocumentPathKind::Scalar { path } | DocumentPathKind::Descriptor { path, .. } => {
                supplied.insert(path.canonical());
            }
            DocumentPathKind::Reference {
                reference_json_paths,
                ..
            } => {
                for pair in reference_json_paths {
                    supplied.insert(pair.reference_json_path.canonical());
                }
            }
        }
    }

    for path in identity_json_paths {
        if !supplied.contains(path.canonical()) {
            return Err(DerivationError::mapping(format!(
                "identityJsonPath '{}' on resource {resource} has no corresponding documentPathsMapping entry",
                path.canonical()
            )));
        }
    }

    let identity: BTreeSet<&str> = identity_json_paths
        .iter()
        .map(|path| path.canonical())
        .collect();

    for mapping in document_paths {
        if !mapping.is_part_of_identity {
            continue;
        }
        let contributes = match &mapping.kind {
            DocumentPathKind::Scalar { path } | DocumentPathKind::Descriptor { path, .. } => {
                identity.contains(path.canonical())
            }
            DocumentPathKind::Reference {
                reference_json_paths,
                ..
            } => reference_json_paths
                .iter()
                .any(|pair| identity.contains(pair.reference_json_path.canonical())),
        };
        if !contributes {
            return Err(DerivationError::mapping(format!(
                "documentPathsMapping entry '{}' on resource {resource} is part of the identity but contributes no identityJsonPath",
                mapping.logical_name
            )));
        }
    }

    Ok(())
}

fn extract_array_uniqueness(
    entry: &Value,
    what: &str,
) -> Result<ArrayUniquenessConstraint, DerivationError> {
    let entry = raw::require_object(entry, &format!("{what}.arrayUniquenessConstraints[]"))?;

    let base_path = match raw::optional_str(entry, "basePath", what)? {
        Some(path) => Some(JsonPathExpression::compile(path)?),
        None => None,
    };

    let mut paths = Vec::new();
    if let Some(path_values) = raw::optional_array(entry, "paths", what)? {
        for path in path_values {
            let path = path.as_str().ok_or_else(|| {
                DerivationError::schema_shape(format!(
                    "{what}.arrayUniquenessConstraints paths must be strings"
                ))
            })?;
            paths.push(JsonPathExpression::compile(path)?);
        }
    }

    let nested = match raw::optional_array(entry, "nestedConstraints", what)? {
        Some(entries) => entries
            .iter()
            .map(|nested| extract_array_uniqueness(nested, what))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ArrayUniquenessConstraint {
        base_path,
        paths,
        nested,
    })
}
