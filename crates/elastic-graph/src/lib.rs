//! Helios Elastic Graph
//!
//! Typed, backend-driven connection arguments compiled to Elasticsearch query
//! DSL, with Relay-style cursor pagination over the results.
//!
//! A connection exposes one namespaced argument bucket per active backend
//! (`filter`, `postFilter`, `nested`, `search`, `ordering`, `facets`, ...)
//! plus the pagination arguments `first`, `last`, `before`, `after` and `id`.
//! Each backend turns its own bucket into clauses on a shared
//! [`QueryBuilder`](types::QueryBuilder); the finished body is sent through a
//! caller-provided [`SearchClient`] and the hits are sliced into a page.
//!
//! # Features
//!
//! - **Lookups**: term, terms, range, exists/isnull, prefix, wildcard,
//!   contains, endswith, in, exclude, gt/gte/lt/lte and geo lookups
//! - **Nested documents**: nested and multi-level nested field trees with
//!   automatic nested scoping
//! - **Backends**: filtering, post-filtering, nested filtering, search,
//!   query strings, ordering, highlight, source, score, facets, aggregations
//!   and suggest
//! - **Pagination**: Relay array-connection cursors with `max_limit` and
//!   `enforce_first_or_last`
//! - **Typed arguments**: argument descriptors computed once per connection
//!   and used to validate every request
//!
//! # Architecture
//!
//! - [`types`] - Field specs, lookups, the query builder, pages and responses
//! - [`lookup`] - Lookup clause compiler and nested path resolver
//! - [`backends`] - The backend contract, the pipeline and every backend
//! - [`pagination`] - Relay slicing
//! - [`registry`] - Document schemas and field type conversion
//! - [`config`] - Connection settings and declarative definitions
//! - [`connection`] - The connection field and the search client contract
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use helios_elastic_graph::config::ConnectionConfig;
//! use helios_elastic_graph::registry::{MappingSchema, SchemaRegistry};
//! use serde_json::json;
//!
//! let mapping = json!({
//!     "mappings": {
//!         "properties": {
//!             "title": { "type": "text", "fields": { "raw": { "type": "keyword" } } },
//!             "category": { "type": "keyword" },
//!             "num_views": { "type": "long" }
//!         }
//!     }
//! });
//! let schema = MappingSchema::from_mapping(&mapping).unwrap();
//! let registry = SchemaRegistry::new().with_document("posts", &schema);
//!
//! let config: ConnectionConfig = serde_json::from_value(json!({
//!     "name": "allPostDocuments",
//!     "document": "posts",
//!     "index": "blog_post",
//!     "backends": ["filtering", "ordering"],
//!     "filter_fields": { "category": null, "num_views": { "lookups": ["gte", "lte"] } },
//!     "ordering_fields": { "title": "title.raw" }
//! }))
//! .unwrap();
//! let connection = config.build(&registry).unwrap();
//!
//! let query = connection
//!     .compile(&json!({
//!         "filter": { "category": "Elastic", "num_views": { "gte": 100 } },
//!         "ordering": { "title": "ASC" }
//!     }))
//!     .unwrap();
//!
//! assert_eq!(
//!     query.body["query"]["bool"]["filter"],
//!     json!([
//!         { "term": { "category": "Elastic" } },
//!         { "range": { "num_views": { "gte": 100 } } }
//!     ])
//! );
//! assert_eq!(query.body["sort"], json!([{ "title.raw": { "order": "asc" } }]));
//! ```
//!
//! Resolving a page needs a [`SearchClient`] implementation:
//!
//! ```ignore
//! let page = connection
//!     .resolve(&client, &json!({ "first": 10, "filter": { "category": "Elastic" } }))
//!     .await?;
//! for edge in &page.window.edges {
//!     println!("{} {}", edge.cursor, edge.node.id);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod connection;
pub mod error;
pub mod lookup;
pub mod pagination;
pub mod registry;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{ConnectionConfig, ConnectionSettings};
pub use connection::{ConnectionField, SearchClient};
pub use error::{
    ConfigurationError, ConversionError, GraphError, GraphResult, SearchError, ValidationError,
};
pub use registry::{DocumentFields, DocumentSchema, MappingSchema, SchemaRegistry};
pub use types::{ConnectionPage, Node, PageInfo, PageWindow, QueryBuilder};

// Re-export the backend contract
pub use backends::{BackendKind, BackendPipeline, FilterBackend};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
