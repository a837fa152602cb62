//! Highlight backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, ArgumentKind, OutputField, QueryBuilder};

/// Engine highlight options of one field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HighlightOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_fragments: Option<u32>,
    /// Any other engine option, sent verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Configuration of one highlightable field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HighlightFieldOptions {
    /// Engine field path; defaults to the argument name.
    #[serde(default)]
    pub field: Option<String>,
    /// Highlight on every request, requested or not.
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub options: HighlightOptions,
}

#[derive(Debug, Clone)]
struct HighlightField {
    name: String,
    path: String,
    enabled: bool,
    options: Value,
}

/// Requests highlight fragments and exposes them on nodes.
#[derive(Debug, Clone)]
pub struct HighlightBackend {
    fields: Vec<HighlightField>,
}

impl HighlightBackend {
    /// Validates the configured fields.
    pub fn new(
        fields: &BTreeMap<String, Option<HighlightFieldOptions>>,
    ) -> Result<Self, ConfigurationError> {
        let mut resolved = Vec::with_capacity(fields.len());
        for (name, options) in fields {
            let options = options.clone().unwrap_or_default();
            let path = options.field.clone().unwrap_or_else(|| name.clone());
            validate_field_path(name, &path)?;
            resolved.push(HighlightField {
                name: name.clone(),
                path,
                enabled: options.enabled,
                options: json!(options.options),
            });
        }
        Ok(Self { fields: resolved })
    }
}

fn requested_names(bucket: Option<&Value>) -> Vec<&str> {
    match bucket {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(name)) => vec![name.as_str()],
        _ => Vec::new(),
    }
}

impl FilterBackend for HighlightBackend {
    fn name(&self) -> &str {
        "highlight"
    }

    fn prefix(&self) -> &str {
        "highlight"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        if self.fields.is_empty() {
            return Vec::new();
        }
        let names = self.fields.iter().map(|f| f.name.clone());
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::list(ArgumentKind::enumeration(names)),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.fields.iter().any(|f| f.name == field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let requested = requested_names(bucket);
        for name in &requested {
            if !self.belongs_to(name) {
                return Err(ValidationError::InvalidArgument {
                    argument: self.prefix().to_string(),
                    message: format!("`{name}` is not a highlight field"),
                });
            }
        }
        for field in &self.fields {
            if field.enabled || requested.contains(&field.name.as_str()) {
                builder.add_highlight(field.path.clone(), field.options.clone());
            }
        }
        Ok(builder)
    }

    fn output_fields(&self) -> &[OutputField] {
        &[OutputField::Highlight]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HighlightBackend {
        let fields = serde_json::from_str(
            r#"{
                "title": null,
                "content": {"field": "content.text", "pre_tags": ["<b>"], "post_tags": ["</b>"], "fragment_size": 50, "type": "unified"},
                "category": {"enabled": true}
            }"#,
        )
        .unwrap();
        HighlightBackend::new(&fields).unwrap()
    }

    #[test]
    fn test_requested_and_enabled_fields() {
        let body = backend()
            .filter(QueryBuilder::new("blog_post"), Some(&json!(["content"])))
            .unwrap()
            .build()
            .body;
        assert_eq!(
            body["highlight"]["fields"],
            json!({
                "category": {},
                "content.text": {
                    "pre_tags": ["<b>"],
                    "post_tags": ["</b>"],
                    "fragment_size": 50,
                    "type": "unified"
                }
            })
        );
    }

    #[test]
    fn test_enabled_fields_apply_without_arguments() {
        let body = backend()
            .filter(QueryBuilder::new("blog_post"), None)
            .unwrap()
            .build()
            .body;
        assert_eq!(body["highlight"]["fields"], json!({ "category": {} }));
    }

    #[test]
    fn test_without_enabled_fields_no_change() {
        let fields = serde_json::from_str(r#"{"title": null}"#).unwrap();
        let backend = HighlightBackend::new(&fields).unwrap();
        let builder = QueryBuilder::new("blog_post");
        assert_eq!(backend.filter(builder.clone(), None).unwrap(), builder);
        assert_eq!(backend.output_fields(), &[OutputField::Highlight]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(
            backend()
                .filter(QueryBuilder::new("blog_post"), Some(&json!(["author"])))
                .is_err()
        );
    }
}
