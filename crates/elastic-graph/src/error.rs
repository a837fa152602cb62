//! Error types for the connection layer.
//!
//! Errors are split by lifecycle: configuration errors are raised while a
//! connection is being built and are fatal, validation errors abort a single
//! request, conversion errors are recovered by excluding the offending field,
//! and search errors come from the search client collaborator and are passed
//! through untouched.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for connection resolution.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Connection definition errors
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Request argument errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Field type conversion errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Search client errors
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Errors raised while building a connection definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A backend reported an empty or malformed argument prefix.
    #[error("backend {backend} has no valid argument prefix (got {prefix:?})")]
    MissingPrefix { backend: String, prefix: String },

    /// Two backends contribute an argument with the same name.
    #[error("argument `{argument}` contributed by {second} collides with {first}")]
    ArgumentCollision {
        argument: String,
        first: String,
        second: String,
    },

    /// Backends declared in an order that breaks their dependencies.
    #[error("backend {backend} must be declared after {required}")]
    BackendOrder { backend: String, required: String },

    /// A field declares an empty lookup set.
    #[error("field `{field}` allows no lookups")]
    EmptyLookups { field: String },

    /// A field's default lookup is outside its allowed set.
    #[error("default lookup `{lookup}` of field `{field}` is not an allowed lookup")]
    InvalidDefaultLookup { field: String, lookup: String },

    /// An engine field path is not a dotted identifier.
    #[error("field `{field}` has an invalid engine path `{path}`")]
    InvalidFieldPath { field: String, path: String },

    /// A facet or aggregation misses a required option.
    #[error("facet `{facet}` requires option `{option}`")]
    MissingFacetOption { facet: String, option: String },

    /// A suggest field misses or misuses a required option.
    #[error("suggest field `{field}`: {message}")]
    InvalidSuggestOption { field: String, message: String },

    /// A connection references a document the registry does not know.
    #[error("unknown document `{document}`")]
    UnknownDocument { document: String },

    /// The field path pattern failed to compile.
    #[error("invalid field path pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A connection definition could not be loaded.
    #[error("failed to load connection definition from {path}: {message}")]
    Load { path: String, message: String },
}

/// Errors raised while validating or applying one request's arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("You must provide a `first` or `last` value to properly paginate the `{connection}` connection.")]
    MissingFirstOrLast { connection: String },

    #[error(
        "Requesting {requested} records on the `{connection}` connection exceeds the `first` limit of {limit} records."
    )]
    LimitExceeded {
        requested: u64,
        connection: String,
        limit: u64,
    },

    #[error("argument `{argument}` must be a non-negative integer")]
    NegativeLimit { argument: String },

    #[error("invalid cursor: {cursor}")]
    InvalidCursor { cursor: String },

    #[error("unknown lookup `{lookup}` on field `{field}`")]
    UnknownLookup { field: String, lookup: String },

    #[error("unknown argument `{argument}`")]
    UnknownArgument { argument: String },

    #[error("invalid value for `{argument}`: {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("invalid value for {lookup} lookup on `{field}`: {message}")]
    InvalidValue {
        field: String,
        lookup: String,
        message: String,
    },
}

/// Errors raised while mapping a document field to a schema scalar type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("field `{field}` of kind `{kind}` cannot be converted to a schema type")]
    UnsupportedFieldKind { field: String, kind: String },
}

/// Errors reported by the search client collaborator.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The engine could not be reached.
    #[error("search engine unavailable: {message}")]
    Unavailable { message: String },

    /// The engine rejected the query body.
    #[error("malformed query: {message}")]
    MalformedQuery { message: String },

    /// The engine answered with a body that could not be read.
    #[error("invalid search response: {message}")]
    InvalidResponse { message: String },

    /// Any other client failure.
    #[error("search client error: {message}")]
    Client {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result alias for connection operations.
pub type GraphResult<T> = Result<T, GraphError>;
