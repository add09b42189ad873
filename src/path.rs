//! Constrained JSONPath compiler used throughout relational model derivation.
//!
//! Supported syntax: `$` as the root, property segments via `.propertyName`,
//! and array wildcard segments via `[*]` (which must follow a property
//! segment). Property names are restricted to letters/digits plus `_` and `-`.
//! The canonical string form is stable and serves as the universal dictionary
//! key and ordering key for paths.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::error::DerivationError;

/// One segment of a compiled JSONPath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum JsonPathSegment {
    /// `.propertyName`
    Property(String),
    /// `[*]`
    AnyArrayElement,
}

/// A compiled JSONPath with its canonical string form.
///
/// Equality, hashing, and ordering all go through the canonical string, so
/// paths compiled from differently-spelled but equivalent inputs compare equal.
#[derive(Debug, Clone, Serialize)]
pub struct JsonPathExpression {
    canonical: String,
    segments: Vec<JsonPathSegment>,
}

impl JsonPathExpression {
    /// The root path `$`.
    pub fn root() -> Self {
        JsonPathExpression {
            canonical: "$".to_string(),
            segments: Vec::new(),
        }
    }

    /// Parses a JSONPath string into a canonical expression.
    pub fn compile(json_path: &str) -> Result<Self, DerivationError> {
        let parse_error = |message: &str| DerivationError::PathParse {
            path: json_path.to_string(),
            message: message.to_string(),
        };

        let bytes: Vec<char> = json_path.chars().collect();
        if bytes.is_empty() {
            return Err(parse_error("path must not be empty"));
        }
        if bytes[0] != '$' {
            return Err(parse_error("path must start with '$'"));
        }

        let mut segments = Vec::new();
        let mut index = 1;

        while index < bytes.len() {
            match bytes[index] {
                '.' => {
                    index += 1;
                    let start = index;
                    while index < bytes.len() && bytes[index] != '.' && bytes[index] != '[' {
                        let character = bytes[index];
                        if !is_valid_property_character(character) {
                            return Err(parse_error(&format!(
                                "invalid property character '{character}'"
                            )));
                        }
                        index += 1;
                    }
                    if index == start {
                        return Err(parse_error("property segments must be non-empty"));
                    }
                    let name: String = bytes[start..index].iter().collect();
                    segments.push(JsonPathSegment::Property(name));
                }
                '[' => {
                    if !matches!(segments.last(), Some(JsonPathSegment::Property(_))) {
                        return Err(parse_error(
                            "array wildcards must follow a property segment",
                        ));
                    }
                    if index + 2 >= bytes.len() || bytes[index + 1] != '*' || bytes[index + 2] != ']'
                    {
                        return Err(parse_error("array segments must use the wildcard [*]"));
                    }
                    segments.push(JsonPathSegment::AnyArrayElement);
                    index += 3;
                }
                other => {
                    return Err(parse_error(&format!("unexpected character '{other}'")));
                }
            }
        }

        Ok(Self::from_segments(segments))
    }

    /// Builds an expression from already-validated segments.
    pub fn from_segments(segments: Vec<JsonPathSegment>) -> Self {
        let canonical = build_canonical(&segments);
        JsonPathExpression {
            canonical,
            segments,
        }
    }

    /// The canonical string form, e.g. `$.addresses[*].periods[*].beginDate`.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn segments(&self) -> &[JsonPathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Appends a property segment.
    pub fn child_property(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(JsonPathSegment::Property(name.to_string()));
        Self::from_segments(segments)
    }

    /// Appends an array wildcard segment.
    pub fn child_array_element(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.push(JsonPathSegment::AnyArrayElement);
        Self::from_segments(segments)
    }

    /// Whether `self` is a (non-strict) prefix of `other`, segment-wise.
    pub fn is_prefix_of(&self, other: &JsonPathExpression) -> bool {
        if self.segments.len() > other.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// The segments of `other` beyond the prefix `self`, or `None` when
    /// `self` is not a prefix of `other`.
    pub fn relative_segments<'a>(
        &self,
        other: &'a JsonPathExpression,
    ) -> Option<&'a [JsonPathSegment]> {
        if !self.is_prefix_of(other) {
            return None;
        }
        Some(&other.segments[self.segments.len()..])
    }

    /// The number of `[*]` segments in the path.
    pub fn array_depth(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, JsonPathSegment::AnyArrayElement))
            .count()
    }

    /// The property names of the path, skipping array wildcards.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            JsonPathSegment::Property(name) => Some(name.as_str()),
            JsonPathSegment::AnyArrayElement => None,
        })
    }
}

impl PartialEq for JsonPathExpression {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for JsonPathExpression {}

impl std::hash::Hash for JsonPathExpression {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for JsonPathExpression {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsonPathExpression {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for JsonPathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

fn build_canonical(segments: &[JsonPathSegment]) -> String {
    let mut canonical = String::from("$");
    for segment in segments {
        match segment {
            JsonPathSegment::Property(name) => {
                canonical.push('.');
                canonical.push_str(name);
            }
            JsonPathSegment::AnyArrayElement => canonical.push_str("[*]"),
        }
    }
    canonical
}

fn is_valid_property_character(character: char) -> bool {
    character == '_' || character == '-' || character.is_alphanumeric()
}
