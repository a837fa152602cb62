//! Field descriptions: engine field kinds, schema scalar types and the
//! immutable filter field specs built at schema-definition time.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lookup::LookupKind;
use crate::error::ConversionError;

/// Structural type of a configured filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// A leaf field.
    #[default]
    Normal,
    /// An inner object; children share the parent document scope.
    Object,
    /// A nested document array; children are matched within one entry.
    Nested,
}

/// The engine-side kind of a document field, as reported by a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Text,
    Keyword,
    Byte,
    Short,
    Integer,
    Long,
    Boolean,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    Date,
    Object,
    Nested,
    GeoPoint,
    /// Any kind without a schema counterpart (completion, binary, ...).
    Other(String),
}

impl FieldKind {
    /// Returns the engine name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Byte => "byte",
            FieldKind::Short => "short",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Boolean => "boolean",
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::HalfFloat => "half_float",
            FieldKind::ScaledFloat => "scaled_float",
            FieldKind::Date => "date",
            FieldKind::Object => "object",
            FieldKind::Nested => "nested",
            FieldKind::GeoPoint => "geo_point",
            FieldKind::Other(name) => name,
        }
    }

    /// Returns true for kinds whose children are reached through sub-paths.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::Object | FieldKind::Nested)
    }
}

impl From<String> for FieldKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => FieldKind::Text,
            "keyword" => FieldKind::Keyword,
            "byte" => FieldKind::Byte,
            "short" => FieldKind::Short,
            "integer" => FieldKind::Integer,
            "long" => FieldKind::Long,
            "boolean" => FieldKind::Boolean,
            "double" => FieldKind::Double,
            "float" => FieldKind::Float,
            "half_float" => FieldKind::HalfFloat,
            "scaled_float" => FieldKind::ScaledFloat,
            "date" => FieldKind::Date,
            "object" => FieldKind::Object,
            "nested" => FieldKind::Nested,
            "geo_point" => FieldKind::GeoPoint,
            _ => FieldKind::Other(value),
        }
    }
}

impl From<&str> for FieldKind {
    fn from(value: &str) -> Self {
        FieldKind::from(value.to_string())
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar type a document field is exposed as in the argument schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    JsonString,
}

impl ScalarType {
    /// Converts an engine field kind to its schema scalar type.
    ///
    /// Kinds without a counterpart produce a [`ConversionError`]; callers
    /// exclude such fields and carry on.
    pub fn from_kind(field: &str, kind: &FieldKind) -> Result<Self, ConversionError> {
        match kind {
            FieldKind::Text | FieldKind::Keyword => Ok(ScalarType::String),
            FieldKind::Byte | FieldKind::Short | FieldKind::Integer | FieldKind::Long => {
                Ok(ScalarType::Int)
            }
            FieldKind::Boolean => Ok(ScalarType::Boolean),
            FieldKind::Double
            | FieldKind::Float
            | FieldKind::HalfFloat
            | FieldKind::ScaledFloat => Ok(ScalarType::Float),
            FieldKind::Date => Ok(ScalarType::DateTime),
            FieldKind::Object | FieldKind::Nested | FieldKind::GeoPoint => {
                Ok(ScalarType::JsonString)
            }
            FieldKind::Other(name) => Err(ConversionError::UnsupportedFieldKind {
                field: field.to_string(),
                kind: name.clone(),
            }),
        }
    }
}

/// A filterable field, resolved once from configuration.
///
/// `name` is the argument name callers use, `path` is the engine field it
/// targets. For fields below a nested document, `nested_scopes` lists every
/// nested ancestor path from the outermost inward.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub path: String,
    pub field_type: FieldType,
    pub lookups: Vec<LookupKind>,
    pub default_lookup: LookupKind,
    pub nested_scopes: Vec<String>,
    pub children: Vec<FieldSpec>,
}

impl FieldSpec {
    /// Creates a leaf field allowing every lookup, defaulting to `term`.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            field_type: FieldType::Normal,
            lookups: LookupKind::all().to_vec(),
            default_lookup: LookupKind::Term,
            nested_scopes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the innermost nested path enclosing this field, if any.
    pub fn nested_path(&self) -> Option<&str> {
        self.nested_scopes.last().map(String::as_str)
    }

    /// Returns true if `lookup` is in this field's allowed set.
    pub fn allows(&self, lookup: LookupKind) -> bool {
        self.lookups.contains(&lookup)
    }

    /// Returns true if this field groups sub-fields instead of taking lookups.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Finds a direct child by argument name.
    pub fn child(&self, name: &str) -> Option<&FieldSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Visits this field and all descendants depth-first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FieldSpec)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}
