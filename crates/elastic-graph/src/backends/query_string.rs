//! Query string backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, ArgumentKind, QueryBuilder, ScalarType};

/// Options of a query string backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryStringOptions {
    /// Searched fields, optionally boosted (`title^3`).
    #[serde(default)]
    pub fields: Vec<String>,
    /// Engine options sent verbatim (`default_operator`, `lenient`, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Which engine query the raw string is passed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStringKind {
    Simple,
    Full,
}

impl QueryStringKind {
    fn query_type(&self) -> &'static str {
        match self {
            QueryStringKind::Simple => "simple_query_string",
            QueryStringKind::Full => "query_string",
        }
    }
}

/// Passes a raw query string and the configured fields to the engine.
#[derive(Debug, Clone)]
pub struct QueryStringBackend {
    kind: QueryStringKind,
    options: QueryStringOptions,
}

impl QueryStringBackend {
    /// A `simple_query_string` backend.
    pub fn simple(options: &QueryStringOptions) -> Result<Self, ConfigurationError> {
        Self::new(QueryStringKind::Simple, options)
    }

    /// A `query_string` backend.
    pub fn full(options: &QueryStringOptions) -> Result<Self, ConfigurationError> {
        Self::new(QueryStringKind::Full, options)
    }

    fn new(kind: QueryStringKind, options: &QueryStringOptions) -> Result<Self, ConfigurationError> {
        for field in &options.fields {
            let path = field.split('^').next().unwrap_or(field);
            // `*` and `title.*` are engine field patterns
            if path != "*" && !path.ends_with(".*") {
                validate_field_path(field, path)?;
            }
        }
        Ok(Self {
            kind,
            options: options.clone(),
        })
    }

    /// Returns the engine query type.
    pub fn kind(&self) -> QueryStringKind {
        self.kind
    }
}

impl FilterBackend for QueryStringBackend {
    fn name(&self) -> &str {
        self.kind.query_type()
    }

    fn prefix(&self) -> &str {
        match self.kind {
            QueryStringKind::Simple => "simpleQueryString",
            QueryStringKind::Full => "queryString",
        }
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::scalar(ScalarType::String),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.options
            .fields
            .iter()
            .any(|f| f.split('^').next() == Some(field_name))
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let Some(bucket) = bucket else {
            return Ok(builder);
        };
        let query = bucket
            .as_str()
            .ok_or_else(|| ValidationError::InvalidArgument {
                argument: self.prefix().to_string(),
                message: "expected a query string".to_string(),
            })?;

        let mut params = self.options.options.clone();
        params.insert("query".to_string(), json!(query));
        if !self.options.fields.is_empty() {
            params.insert("fields".to_string(), json!(self.options.fields));
        }
        builder.add_must(json!({ self.kind.query_type(): params }));
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> QueryStringOptions {
        serde_json::from_str(
            r#"{"fields": ["title^3", "content"], "default_operator": "and", "lenient": true}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_simple_query_string_passes_options_verbatim() {
        let backend = QueryStringBackend::simple(&options()).unwrap();
        assert_eq!(backend.prefix(), "simpleQueryString");

        let body = backend
            .filter(QueryBuilder::new("blog_post"), Some(&json!("elastic +search")))
            .unwrap()
            .build()
            .body;
        assert_eq!(
            body["query"]["bool"]["must"][0],
            json!({
                "simple_query_string": {
                    "default_operator": "and",
                    "lenient": true,
                    "query": "elastic +search",
                    "fields": ["title^3", "content"]
                }
            })
        );
    }

    #[test]
    fn test_query_string_kind_and_fields() {
        let backend = QueryStringBackend::full(&options()).unwrap();
        assert_eq!(backend.name(), "query_string");
        assert_eq!(backend.prefix(), "queryString");
        assert!(backend.belongs_to("title"));
        assert!(!backend.belongs_to("category"));

        let body = backend
            .filter(QueryBuilder::new("blog_post"), Some(&json!("title:elastic")))
            .unwrap()
            .build()
            .body;
        assert_eq!(body["query"]["bool"]["must"][0]["query_string"]["query"], "title:elastic");
    }

    #[test]
    fn test_rejects_invalid_field_paths() {
        let options: QueryStringOptions =
            serde_json::from_str(r#"{"fields": ["title raw"]}"#).unwrap();
        assert!(QueryStringBackend::simple(&options).is_err());

        let options: QueryStringOptions = serde_json::from_str(r#"{"fields": ["*"]}"#).unwrap();
        assert!(QueryStringBackend::simple(&options).is_ok());
    }
}
