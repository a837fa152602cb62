//! Lookup compilation and nested field resolution.

pub mod compiler;
pub mod nested;

pub use compiler::{compile, compile_request, resolve_lookup};
pub use nested::{
    DEFAULT_LOOKUP_KEY, build_field_specs, collect_requests, scopes_for_path, wrap, wrap_scopes,
};
