//! Document schema registry.
//!
//! The registry holds, per document, the engine field kinds reported by a
//! [`DocumentSchema`] collaborator and their converted schema scalar types.
//! It is built once while connections are defined and read-only afterwards;
//! connection builders receive it explicitly.
//!
//! Fields whose kind has no schema counterpart are recorded as excluded and
//! never exposed as arguments.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{ConfigurationError, ConversionError};
use crate::types::{FieldKind, ScalarType};

/// Source of a document's field kinds.
pub trait DocumentSchema: Send + Sync {
    /// Returns every field as (dotted path, kind), containers included.
    fn fields(&self) -> Vec<(String, FieldKind)>;

    /// Returns the kind of the field at `path`.
    fn field_kind(&self, path: &str) -> Option<FieldKind> {
        self.fields()
            .into_iter()
            .find(|(name, _)| name == path)
            .map(|(_, kind)| kind)
    }
}

/// A [`DocumentSchema`] read from an engine index mapping.
#[derive(Debug, Clone, Default)]
pub struct MappingSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl MappingSchema {
    /// Creates a schema from explicit (path, kind) pairs.
    pub fn new<I, P, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (P, K)>,
        P: Into<String>,
        K: Into<FieldKind>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(p, k)| (p.into(), k.into()))
                .collect(),
        }
    }

    /// Reads a mapping body. Accepts either `{"mappings": {"properties": ..}}`
    /// or a bare `{"properties": ..}`.
    pub fn from_mapping(mapping: &Value) -> Result<Self, ConfigurationError> {
        let root = mapping.get("mappings").unwrap_or(mapping);
        let properties = root
            .get("properties")
            .and_then(|p| p.as_object())
            .ok_or_else(|| ConfigurationError::Load {
                path: "mapping".to_string(),
                message: "mapping has no properties".to_string(),
            })?;

        let mut fields = BTreeMap::new();
        collect_properties(None, properties, &mut fields);
        Ok(Self { fields })
    }
}

fn collect_properties(
    parent: Option<&str>,
    properties: &serde_json::Map<String, Value>,
    out: &mut BTreeMap<String, FieldKind>,
) {
    for (name, definition) in properties {
        let path = match parent {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        };
        let children = definition.get("properties").and_then(|p| p.as_object());
        // an untyped field with properties is an object
        let kind = match definition.get("type").and_then(|t| t.as_str()) {
            Some(kind) => FieldKind::from(kind),
            None if children.is_some() => FieldKind::Object,
            None => continue,
        };
        out.insert(path.clone(), kind);
        if let Some(multi_fields) = definition.get("fields").and_then(|f| f.as_object()) {
            collect_properties(Some(&path), multi_fields, out);
        }
        if let Some(children) = children {
            collect_properties(Some(&path), children, out);
        }
    }
}

impl DocumentSchema for MappingSchema {
    fn fields(&self) -> Vec<(String, FieldKind)> {
        self.fields
            .iter()
            .map(|(path, kind)| (path.clone(), kind.clone()))
            .collect()
    }

    fn field_kind(&self, path: &str) -> Option<FieldKind> {
        self.fields.get(path).cloned()
    }
}

/// The converted fields of one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentFields {
    name: String,
    kinds: BTreeMap<String, FieldKind>,
    scalars: BTreeMap<String, ScalarType>,
    excluded: BTreeMap<String, ConversionError>,
}

impl DocumentFields {
    /// Converts every top-level field of `schema`. Conversion failures are
    /// logged and the field is excluded.
    pub fn from_schema(name: impl Into<String>, schema: &dyn DocumentSchema) -> Self {
        let name = name.into();
        let kinds: BTreeMap<String, FieldKind> = schema.fields().into_iter().collect();
        let mut scalars = BTreeMap::new();
        let mut excluded = BTreeMap::new();

        for (path, kind) in kinds.iter().filter(|(path, _)| !path.contains('.')) {
            match ScalarType::from_kind(path, kind) {
                Ok(scalar) => {
                    scalars.insert(path.clone(), scalar);
                }
                Err(e) => {
                    tracing::warn!(document = %name, field = %path, error = %e, "Excluding field");
                    excluded.insert(path.clone(), e);
                }
            }
        }

        Self {
            name,
            kinds,
            scalars,
            excluded,
        }
    }

    /// Returns the document name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the top-level field converted to a schema type.
    pub fn is_filterable(&self, field: &str) -> bool {
        self.scalars.contains_key(field)
    }

    /// Returns the schema type of a top-level field.
    pub fn scalar_type(&self, field: &str) -> Option<ScalarType> {
        self.scalars.get(field).copied()
    }

    /// Returns the engine kind of the field at `path`.
    pub fn field_kind(&self, path: &str) -> Option<&FieldKind> {
        self.kinds.get(path)
    }

    /// Returns the schema type of the field at any `path`, converting on
    /// demand for sub-fields.
    pub fn path_scalar_type(&self, path: &str) -> Option<ScalarType> {
        self.scalar_type(path)
            .or_else(|| ScalarType::from_kind(path, self.field_kind(path)?).ok())
    }

    /// Iterates the convertible top-level fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.scalars.keys().map(String::as_str)
    }

    /// Returns the fields excluded by conversion failures.
    pub fn excluded(&self) -> &BTreeMap<String, ConversionError> {
        &self.excluded
    }
}

/// Registry of documents available to connections.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    documents: HashMap<String, DocumentFields>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a document.
    pub fn register(&mut self, name: impl Into<String>, schema: &dyn DocumentSchema) -> &DocumentFields {
        let name = name.into();
        let fields = DocumentFields::from_schema(name.clone(), schema);
        self.documents.insert(name.clone(), fields);
        &self.documents[&name]
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_document(mut self, name: impl Into<String>, schema: &dyn DocumentSchema) -> Self {
        self.register(name, schema);
        self
    }

    /// Looks up a registered document.
    pub fn document(&self, name: &str) -> Result<&DocumentFields, ConfigurationError> {
        self.documents
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownDocument {
                document: name.to_string(),
            })
    }

    /// Returns the number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if no documents are registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
