//! Source filtering backend.

use serde_json::Value;

use super::FilterBackend;
use crate::error::ValidationError;
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, ArgumentKind, QueryBuilder, SourceFilter};

const IDENTITY_FIELDS: [&str; 2] = ["_id", "id"];

/// Restricts the stored fields returned with each hit.
///
/// The configured filter applies to every request; a `source` argument
/// replaces it.
#[derive(Debug, Clone, Default)]
pub struct SourceBackend {
    configured: Option<SourceFilter>,
}

impl SourceBackend {
    /// Creates the backend with an optional configured filter.
    pub fn new(configured: Option<SourceFilter>) -> Self {
        Self { configured }
    }
}

impl FilterBackend for SourceBackend {
    fn name(&self) -> &str {
        "source"
    }

    fn prefix(&self) -> &str {
        "source"
    }

    fn contributed_fields(&self, document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        let names: Vec<&str> = document
            .field_names()
            .filter(|name| !IDENTITY_FIELDS.contains(name))
            .collect();
        if names.is_empty() {
            return Vec::new();
        }
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::list(ArgumentKind::enumeration(names)),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        match &self.configured {
            Some(SourceFilter::Fields(fields)) => fields.iter().any(|f| f == field_name),
            Some(SourceFilter::Patterns { includes, .. }) => includes.iter().any(|f| f == field_name),
            None => false,
        }
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let requested = match bucket {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(Value::String(field)) => Some(vec![field.clone()]),
            Some(_) => {
                return Err(ValidationError::InvalidArgument {
                    argument: self.prefix().to_string(),
                    message: "expected a list of field names".to_string(),
                });
            }
            None => None,
        };

        match (requested, &self.configured) {
            (Some(fields), _) => builder.set_source(SourceFilter::Fields(fields)),
            (None, Some(configured)) => builder.set_source(configured.clone()),
            (None, None) => {}
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MappingSchema;
    use serde_json::json;

    fn document() -> DocumentFields {
        let schema = MappingSchema::new([
            ("id", "keyword"),
            ("title", "text"),
            ("content", "text"),
            ("title_suggest", "completion"),
        ]);
        DocumentFields::from_schema("posts", &schema)
    }

    #[test]
    fn test_argument_enum_excludes_identity() {
        let descriptors = SourceBackend::default().contributed_fields(&document());
        assert_eq!(
            descriptors[0].kind,
            ArgumentKind::list(ArgumentKind::enumeration(["content", "title"]))
        );
    }

    #[test]
    fn test_request_overrides_configured_filter() {
        let backend = SourceBackend::new(Some(SourceFilter::Patterns {
            includes: vec!["title".to_string()],
            excludes: vec!["content".to_string()],
        }));

        let body = backend
            .filter(QueryBuilder::new("blog_post"), None)
            .unwrap()
            .build()
            .body;
        assert_eq!(
            body["_source"],
            json!({ "includes": ["title"], "excludes": ["content"] })
        );

        let body = backend
            .filter(QueryBuilder::new("blog_post"), Some(&json!(["content"])))
            .unwrap()
            .build()
            .body;
        assert_eq!(body["_source"], json!(["content"]));
    }

    #[test]
    fn test_unconfigured_without_arguments_is_noop() {
        let builder = QueryBuilder::new("blog_post");
        assert_eq!(
            SourceBackend::default().filter(builder.clone(), None).unwrap(),
            builder
        );
    }
}
