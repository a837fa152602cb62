//! Filter backends and the pipeline that runs them.
//!
//! A backend owns one concern (filtering, ordering, highlighting, ...). It
//! contributes a namespaced argument bucket to the connection's argument
//! tree and, per request, mutates the query builder using only the contents
//! of that bucket.
//!
//! # Pipeline
//!
//! The backend list of a connection is fixed when the connection is built.
//! [`BackendPipeline`] unions the backends' argument contributions (a name
//! collision is a configuration error) and applies the backends in declared
//! order:
//!
//! ```
//! use helios_elastic_graph::backends::{BackendPipeline, FilterBackend, OrderingBackend, DefaultOrderingBackend};
//! use helios_elastic_graph::registry::{DocumentFields, MappingSchema};
//! use helios_elastic_graph::types::QueryBuilder;
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let schema = MappingSchema::new([("title", "text"), ("num_views", "long")]);
//! let document = DocumentFields::from_schema("posts", &schema);
//!
//! let ordering_fields = BTreeMap::from([
//!     ("title".to_string(), "title.raw".to_string()),
//!     ("num_views".to_string(), "num_views".to_string()),
//! ]);
//! let backends: Vec<Box<dyn FilterBackend>> = vec![
//!     Box::new(OrderingBackend::new(&ordering_fields).unwrap()),
//!     Box::new(DefaultOrderingBackend::new(&["-num_views".to_string()], &ordering_fields).unwrap()),
//! ];
//! let pipeline = BackendPipeline::new("allPostDocuments", backends, &document).unwrap();
//!
//! let args = json!({ "ordering": { "title": "ASC" } });
//! let builder = pipeline
//!     .apply(QueryBuilder::new("blog_post"), args.as_object().unwrap())
//!     .unwrap();
//! assert_eq!(builder.build().body["sort"], json!([{ "title.raw": { "order": "asc" } }]));
//! ```

mod faceted;
mod filtering;
mod highlight;
mod nested_filter;
mod ordering;
mod post_filter;
mod query_string;
mod score;
mod search;
mod source;
mod suggest;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{
    ArgumentDescriptor, ArgumentKind, ConnectionExtras, OutputField, QueryBuilder, ScalarType,
    SchemaArguments, SearchResponse,
};

pub use faceted::{
    AggregationsBackend, FacetDefinition, FacetKind, FacetOptions, FacetedSearchBackend,
};
pub use filtering::FilteringBackend;
pub use highlight::{HighlightBackend, HighlightFieldOptions, HighlightOptions};
pub use nested_filter::NestedFilteringBackend;
pub use ordering::{DefaultOrderingBackend, OrderingBackend};
pub use post_filter::PostFilteringBackend;
pub use query_string::{QueryStringBackend, QueryStringKind, QueryStringOptions};
pub use score::ScoreBackend;
pub use search::{NestedSearchOptions, SearchBackend, SearchFieldOptions};
pub use source::SourceBackend;
pub use suggest::{
    CompletionOptions, SuggestBackend, SuggestDefinition, SuggestOptions, SuggesterKind,
    SuggesterSettings,
};

/// Arguments every connection accepts besides the backend buckets.
pub const CONNECTION_ARGUMENTS: [&str; 5] = ["first", "last", "before", "after", "id"];

/// One pluggable query concern.
pub trait FilterBackend: fmt::Debug + Send + Sync {
    /// Backend name used in logs and configuration errors.
    fn name(&self) -> &str;

    /// Name of the argument bucket this backend reads.
    fn prefix(&self) -> &str;

    /// Top-level arguments this backend contributes.
    fn contributed_fields(&self, document: &DocumentFields) -> Vec<ArgumentDescriptor>;

    /// Returns true if `field_name` is configured for this backend.
    fn belongs_to(&self, field_name: &str) -> bool;

    /// Applies this request's bucket to the builder. Must leave the builder
    /// unchanged when `bucket` is absent, unless the backend has statically
    /// enabled entries.
    fn filter(
        &self,
        builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError>;

    /// Node-level output fields this backend adds.
    fn output_fields(&self) -> &[OutputField] {
        &[]
    }

    /// Attaches side-channel data from the search response.
    fn alter_connection(&self, _response: &SearchResponse, _extras: &mut ConnectionExtras) {}
}

/// Built-in backend kinds, as named in connection definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Filtering,
    PostFiltering,
    NestedFiltering,
    Search,
    SimpleQueryString,
    QueryString,
    Ordering,
    DefaultOrdering,
    Highlight,
    Source,
    Score,
    FacetedSearch,
    Aggregations,
    Suggest,
}

impl BackendKind {
    /// Backends used when a connection does not list any.
    pub fn defaults() -> &'static [BackendKind] {
        &[
            BackendKind::Search,
            BackendKind::Filtering,
            BackendKind::Ordering,
            BackendKind::DefaultOrdering,
        ]
    }

    /// Returns the configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Filtering => "filtering",
            BackendKind::PostFiltering => "post_filtering",
            BackendKind::NestedFiltering => "nested_filtering",
            BackendKind::Search => "search",
            BackendKind::SimpleQueryString => "simple_query_string",
            BackendKind::QueryString => "query_string",
            BackendKind::Ordering => "ordering",
            BackendKind::DefaultOrdering => "default_ordering",
            BackendKind::Highlight => "highlight",
            BackendKind::Source => "source",
            BackendKind::Score => "score",
            BackendKind::FacetedSearch => "faceted_search",
            BackendKind::Aggregations => "aggregations",
            BackendKind::Suggest => "suggest",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn connection_arguments() -> Vec<ArgumentDescriptor> {
    vec![
        ArgumentDescriptor::new("first", ArgumentKind::scalar(ScalarType::Int)),
        ArgumentDescriptor::new("last", ArgumentKind::scalar(ScalarType::Int)),
        ArgumentDescriptor::new("before", ArgumentKind::scalar(ScalarType::String)),
        ArgumentDescriptor::new("after", ArgumentKind::scalar(ScalarType::String)),
        ArgumentDescriptor::new("id", ArgumentKind::scalar(ScalarType::String)),
    ]
}

/// The ordered backends of one connection and their argument tree.
#[derive(Debug)]
pub struct BackendPipeline {
    connection: String,
    backends: Vec<Box<dyn FilterBackend>>,
    arguments: SchemaArguments,
    output_fields: Vec<OutputField>,
}

impl BackendPipeline {
    /// Validates the backend list and computes the argument tree.
    pub fn new(
        connection: impl Into<String>,
        backends: Vec<Box<dyn FilterBackend>>,
        document: &DocumentFields,
    ) -> Result<Self, ConfigurationError> {
        let connection = connection.into();

        for backend in &backends {
            if !is_valid_prefix(backend.prefix()) {
                return Err(ConfigurationError::MissingPrefix {
                    backend: backend.name().to_string(),
                    prefix: backend.prefix().to_string(),
                });
            }
        }

        let position = |name: &str| backends.iter().position(|b| b.name() == name);
        if let (Some(ordering), Some(default_ordering)) = (
            position(BackendKind::Ordering.as_str()),
            position(BackendKind::DefaultOrdering.as_str()),
        ) {
            if default_ordering < ordering {
                return Err(ConfigurationError::BackendOrder {
                    backend: BackendKind::DefaultOrdering.to_string(),
                    required: BackendKind::Ordering.to_string(),
                });
            }
        }

        let mut arguments = SchemaArguments::new();
        for descriptor in connection_arguments() {
            let name = descriptor.name.clone();
            arguments
                .insert("connection", descriptor)
                .map_err(|first| ConfigurationError::ArgumentCollision {
                    argument: name,
                    first,
                    second: "connection".to_string(),
                })?;
        }

        let mut output_fields = Vec::new();
        for backend in &backends {
            for descriptor in backend.contributed_fields(document) {
                let name = descriptor.name.clone();
                arguments.insert(backend.name(), descriptor).map_err(|first| {
                    ConfigurationError::ArgumentCollision {
                        argument: name,
                        first,
                        second: backend.name().to_string(),
                    }
                })?;
            }
            for field in backend.output_fields() {
                if !output_fields.contains(field) {
                    output_fields.push(*field);
                }
            }
        }

        Ok(Self {
            connection,
            backends,
            arguments,
            output_fields,
        })
    }

    /// Returns the connection name.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Returns the backends in application order.
    pub fn backends(&self) -> &[Box<dyn FilterBackend>] {
        &self.backends
    }

    /// Returns the argument tree, connection arguments included.
    pub fn arguments(&self) -> &SchemaArguments {
        &self.arguments
    }

    /// Returns the node output fields contributed by the backends.
    pub fn output_fields(&self) -> &[OutputField] {
        &self.output_fields
    }

    /// Validates an argument object against the argument tree.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), ValidationError> {
        self.arguments.validate(args)
    }

    /// Validates `args` and runs every backend over `builder` in order.
    pub fn apply(
        &self,
        builder: QueryBuilder,
        args: &Map<String, Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        self.validate(args)?;
        self.backends.iter().try_fold(builder, |builder, backend| {
            let bucket = args.get(backend.prefix()).filter(|v| !v.is_null());
            tracing::debug!(
                connection = %self.connection,
                backend = backend.name(),
                has_arguments = bucket.is_some(),
                "Applying backend"
            );
            backend.filter(builder, bucket)
        })
    }

    /// Lets every backend attach side-channel data from `response`.
    pub fn alter_connection(&self, response: &SearchResponse) -> ConnectionExtras {
        let mut extras = ConnectionExtras::new();
        for backend in &self.backends {
            backend.alter_connection(response, &mut extras);
        }
        extras
    }
}
