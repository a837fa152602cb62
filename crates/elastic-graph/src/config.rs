//! Connection configuration.
//!
//! [`ConnectionSettings`] carries the pagination and parsing knobs shared by
//! every connection. [`ConnectionConfig`] is a declarative connection
//! definition that can be loaded from JSON and built against a
//! [`SchemaRegistry`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backends::{
    AggregationsBackend, BackendKind, DefaultOrderingBackend, FacetOptions, FacetedSearchBackend,
    FilterBackend, FilteringBackend, HighlightBackend, HighlightFieldOptions,
    NestedFilteringBackend, NestedSearchOptions, OrderingBackend, PostFilteringBackend,
    QueryStringBackend, QueryStringOptions, ScoreBackend, SearchBackend, SearchFieldOptions,
    SourceBackend, SuggestBackend, SuggestOptions,
};
use crate::connection::ConnectionField;
use crate::error::ConfigurationError;
use crate::registry::SchemaRegistry;
use crate::types::{FieldType, LookupKind, SourceFilter};

/// Pagination and argument parsing settings of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Upper bound for `first`/`last`; also the page size when neither is
    /// given. `None` disables the bound.
    #[serde(default = "default_max_limit")]
    pub max_limit: Option<u64>,

    /// Reject requests that give neither `first` nor `last`.
    #[serde(default)]
    pub enforce_first_or_last: bool,

    /// Delimiter of string-encoded multi-values (`a__b__c`).
    #[serde(default = "default_value_separator")]
    pub value_separator: String,
}

fn default_max_limit() -> Option<u64> {
    Some(100)
}

fn default_value_separator() -> String {
    "__".to_string()
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_limit: default_max_limit(),
            enforce_first_or_last: false,
            value_separator: default_value_separator(),
        }
    }
}

/// Configuration of one filterable field.
///
/// A bare string names the engine field; `null` keeps the argument name as
/// the engine field and allows every lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldOptions {
    /// Engine field path.
    Path(String),
    /// Full definition.
    Detailed(FieldDefinition),
    /// Defaults from the document schema.
    #[default]
    Inherit,
}

/// Detailed filter field configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    /// Engine field path; defaults to the argument name.
    #[serde(default)]
    pub field: Option<String>,
    /// Allowed lookups; all lookups when absent.
    #[serde(default)]
    pub lookups: Option<Vec<LookupKind>>,
    /// Lookup used for bare values; the first allowed lookup when absent.
    #[serde(default)]
    pub default_lookup: Option<LookupKind>,
    /// Structural type; taken from the document schema when absent.
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    /// Sub-fields of an object or nested field.
    #[serde(default)]
    pub properties: BTreeMap<String, FieldOptions>,
}

impl FieldOptions {
    /// Returns the detailed form, expanding shorthands.
    pub fn definition(&self) -> FieldDefinition {
        match self {
            FieldOptions::Path(path) => FieldDefinition {
                field: Some(path.clone()),
                ..Default::default()
            },
            FieldOptions::Detailed(definition) => definition.clone(),
            FieldOptions::Inherit => FieldDefinition::default(),
        }
    }
}

const FIELD_PATH_PATTERN: &str = r"^[A-Za-z_@][A-Za-z0-9_@\-]*(\.[A-Za-z0-9_@\-]+)*$";

static FIELD_PATH: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(FIELD_PATH_PATTERN));

/// Checks that `path` is a dotted engine field path.
pub fn validate_field_path(field: &str, path: &str) -> Result<(), ConfigurationError> {
    let pattern = FIELD_PATH.as_ref().map_err(Clone::clone)?;
    if pattern.is_match(path) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidFieldPath {
            field: field.to_string(),
            path: path.to_string(),
        })
    }
}

/// A declarative connection definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection (field) name, used in error messages.
    pub name: String,
    /// Registered document name.
    pub document: String,
    /// Engine index.
    pub index: String,
    /// Active backends in application order.
    pub backends: Vec<BackendKind>,
    /// Fields exposed under `filter`.
    pub filter_fields: BTreeMap<String, FieldOptions>,
    /// Fields exposed under `postFilter`.
    pub post_filter_fields: BTreeMap<String, FieldOptions>,
    /// Nested roots and their children exposed under `nested`.
    pub nested_filter_fields: BTreeMap<String, BTreeMap<String, FieldOptions>>,
    /// Fields searched by `search`.
    pub search_fields: BTreeMap<String, SearchFieldOptions>,
    /// Nested groups searched by `search`.
    pub search_nested_fields: BTreeMap<String, NestedSearchOptions>,
    /// Options for the `simpleQueryString` backend.
    pub simple_query_string_options: QueryStringOptions,
    /// Options for the `queryString` backend.
    pub query_string_options: QueryStringOptions,
    /// Orderable argument names mapped to engine paths.
    pub ordering_fields: BTreeMap<String, String>,
    /// Default sort, `-` prefixed for descending.
    pub ordering_defaults: Vec<String>,
    /// Highlightable fields.
    pub highlight_fields: BTreeMap<String, Option<HighlightFieldOptions>>,
    /// Default `_source` filter.
    pub source_fields: Option<SourceFilter>,
    /// Facets returned with every page when enabled.
    pub faceted_search_fields: BTreeMap<String, Option<FacetOptions>>,
    /// Aggregations requested by name.
    pub aggregations_fields: BTreeMap<String, Option<FacetOptions>>,
    /// Suggestable fields.
    pub suggest_fields: BTreeMap<String, SuggestOptions>,
    /// Pagination settings.
    pub settings: ConnectionSettings,
}

impl ConnectionConfig {
    /// Loads a definition from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let load_error = |message: String| ConfigurationError::Load {
            path: path.display().to_string(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))
    }

    /// Returns the configured backends, or the default set when none are.
    pub fn backend_kinds(&self) -> Vec<BackendKind> {
        if self.backends.is_empty() {
            BackendKind::defaults().to_vec()
        } else {
            self.backends.clone()
        }
    }

    /// Validates the definition and builds the connection.
    pub fn build(&self, registry: &SchemaRegistry) -> Result<ConnectionField, ConfigurationError> {
        let document = registry.document(&self.document)?;
        let settings = &self.settings;

        let mut backends: Vec<Box<dyn FilterBackend>> = Vec::new();
        for kind in self.backend_kinds() {
            let backend: Box<dyn FilterBackend> = match kind {
                BackendKind::Filtering => Box::new(FilteringBackend::new(
                    &self.filter_fields,
                    document,
                    settings,
                )?),
                BackendKind::PostFiltering => Box::new(PostFilteringBackend::new(
                    &self.post_filter_fields,
                    document,
                    settings,
                )?),
                BackendKind::NestedFiltering => Box::new(NestedFilteringBackend::new(
                    &self.nested_filter_fields,
                    document,
                    settings,
                )?),
                BackendKind::Search => Box::new(SearchBackend::new(
                    &self.search_fields,
                    &self.search_nested_fields,
                    document,
                )?),
                BackendKind::SimpleQueryString => Box::new(QueryStringBackend::simple(
                    &self.simple_query_string_options,
                )?),
                BackendKind::QueryString => {
                    Box::new(QueryStringBackend::full(&self.query_string_options)?)
                }
                BackendKind::Ordering => Box::new(OrderingBackend::new(&self.ordering_fields)?),
                BackendKind::DefaultOrdering => Box::new(DefaultOrderingBackend::new(
                    &self.ordering_defaults,
                    &self.ordering_fields,
                )?),
                BackendKind::Highlight => Box::new(HighlightBackend::new(&self.highlight_fields)?),
                BackendKind::Source => Box::new(SourceBackend::new(self.source_fields.clone())),
                BackendKind::Score => Box::new(ScoreBackend),
                BackendKind::FacetedSearch => {
                    Box::new(FacetedSearchBackend::new(&self.faceted_search_fields)?)
                }
                BackendKind::Aggregations => {
                    Box::new(AggregationsBackend::new(&self.aggregations_fields)?)
                }
                BackendKind::Suggest => Box::new(SuggestBackend::new(&self.suggest_fields)?),
            };
            backends.push(backend);
        }

        ConnectionField::new(
            self.name.clone(),
            self.index.clone(),
            backends,
            document,
            settings.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.max_limit, Some(100));
        assert!(!settings.enforce_first_or_last);
        assert_eq!(settings.value_separator, "__");

        let parsed: ConnectionSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, settings);

        let parsed: ConnectionSettings =
            serde_json::from_str(r#"{"max_limit": null, "enforce_first_or_last": true}"#).unwrap();
        assert_eq!(parsed.max_limit, None);
        assert!(parsed.enforce_first_or_last);
    }

    #[test]
    fn test_field_options_shorthands() {
        let fields: BTreeMap<String, FieldOptions> = serde_json::from_str(
            r#"{
                "title": "title.raw",
                "category": null,
                "tags": {"lookups": ["terms", "in"], "default_lookup": "in"},
                "comments": {"type": "nested", "properties": {"author": null}}
            }"#,
        )
        .unwrap();

        assert_eq!(
            fields["title"].definition().field.as_deref(),
            Some("title.raw")
        );
        assert_eq!(fields["category"], FieldOptions::Inherit);
        let tags = fields["tags"].definition();
        assert_eq!(tags.lookups, Some(vec![LookupKind::Terms, LookupKind::In]));
        assert_eq!(tags.default_lookup, Some(LookupKind::In));
        let comments = fields["comments"].definition();
        assert_eq!(comments.field_type, Some(FieldType::Nested));
        assert!(comments.properties.contains_key("author"));
    }

    #[test]
    fn test_validate_field_path() {
        assert!(validate_field_path("title", "title.raw").is_ok());
        assert!(validate_field_path("id", "_id").is_ok());
        assert!(validate_field_path("title", "title..raw").is_err());
        assert!(validate_field_path("title", "").is_err());
        assert!(validate_field_path("title", "title raw").is_err());
        assert!(matches!(
            validate_field_path("title", "title raw"),
            Err(ConfigurationError::InvalidFieldPath { .. })
        ));
    }

    #[test]
    fn test_field_path_pattern_compiles() {
        assert!(FIELD_PATH.is_ok());
    }

    #[test]
    fn test_default_backend_kinds() {
        let config = ConnectionConfig::default();
        assert_eq!(
            config.backend_kinds(),
            vec![
                BackendKind::Search,
                BackendKind::Filtering,
                BackendKind::Ordering,
                BackendKind::DefaultOrdering
            ]
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(
            &path,
            r#"{"name": "allPostDocuments", "document": "posts", "index": "blog_post",
                "backends": ["filtering", "ordering"],
                "ordering_fields": {"title": "title.raw"},
                "settings": {"max_limit": 20}}"#,
        )
        .unwrap();

        let config = ConnectionConfig::from_path(&path).unwrap();
        assert_eq!(config.name, "allPostDocuments");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.settings.max_limit, Some(20));
        assert_eq!(config.settings.value_separator, "__");

        let err = ConnectionConfig::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Load { .. }));
    }
}
