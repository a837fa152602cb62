//! Nested path resolution.
//!
//! Builds [`FieldSpec`] trees from field configuration, propagating engine
//! paths and nested scopes to every descendant, and turns a caller's argument
//! tree into [`LookupRequest`]s bound to those scopes.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::compiler::resolve_lookup;
use crate::config::{FieldOptions, validate_field_path};
use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{Clause, FieldKind, FieldSpec, FieldType, LookupKind, LookupRequest};

/// Argument key that selects a field's default lookup.
pub const DEFAULT_LOOKUP_KEY: &str = "value";

/// Wraps `clause` in a nested scope bound to `nested_path`, if any.
pub fn wrap(clause: Clause, nested_path: Option<&str>) -> Clause {
    match nested_path {
        Some(path) => Clause::new(
            json!({ "nested": { "path": path, "query": clause.body } }),
            clause.occur,
        ),
        None => clause,
    }
}

/// Wraps `clause` in every scope of `scopes`, outermost first.
pub fn wrap_scopes(clause: Clause, scopes: &[String]) -> Clause {
    scopes
        .iter()
        .rev()
        .fold(clause, |clause, scope| wrap(clause, Some(scope)))
}

/// Returns the nested scopes a clause on `path` needs, one per path prefix
/// (`a.b` gives `["a", "a.b"]`).
pub fn scopes_for_path(path: &str) -> Vec<String> {
    let mut scopes = Vec::new();
    let mut current = String::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('.');
        }
        current.push_str(segment);
        scopes.push(current.clone());
    }
    scopes
}

/// Builds field specs for one level of configuration.
///
/// Sub-fields of object and nested fields are built recursively: their path
/// is `parent.child` and each nested ancestor adds a scope.
pub fn build_field_specs(
    options: &BTreeMap<String, FieldOptions>,
    document: Option<&DocumentFields>,
    parent: Option<&FieldSpec>,
) -> Result<Vec<FieldSpec>, ConfigurationError> {
    options
        .iter()
        .map(|(name, options)| build_field_spec(name, options, document, parent))
        .collect()
}

fn build_field_spec(
    name: &str,
    options: &FieldOptions,
    document: Option<&DocumentFields>,
    parent: Option<&FieldSpec>,
) -> Result<FieldSpec, ConfigurationError> {
    let definition = options.definition();
    let own = definition.field.as_deref().unwrap_or(name);
    let path = match parent {
        Some(parent) => format!("{}.{own}", parent.path),
        None => own.to_string(),
    };
    validate_field_path(name, &path)?;

    let field_type = match definition.field_type {
        Some(field_type) => field_type,
        None if !definition.properties.is_empty() => {
            match document.and_then(|d| d.field_kind(&path)) {
                Some(FieldKind::Nested) => FieldType::Nested,
                _ => FieldType::Object,
            }
        }
        None => FieldType::Normal,
    };

    let lookups = definition
        .lookups
        .clone()
        .unwrap_or_else(|| LookupKind::all().to_vec());
    let default_lookup = match (definition.default_lookup, lookups.first()) {
        (Some(lookup), _) => lookup,
        (None, Some(first)) => *first,
        (None, None) => {
            return Err(ConfigurationError::EmptyLookups {
                field: name.to_string(),
            });
        }
    };
    if lookups.is_empty() {
        return Err(ConfigurationError::EmptyLookups {
            field: name.to_string(),
        });
    }
    if !lookups.contains(&default_lookup) {
        return Err(ConfigurationError::InvalidDefaultLookup {
            field: name.to_string(),
            lookup: default_lookup.to_string(),
        });
    }

    let mut nested_scopes = Vec::new();
    if let Some(parent) = parent {
        nested_scopes.extend(parent.nested_scopes.iter().cloned());
        if parent.field_type == FieldType::Nested {
            nested_scopes.push(parent.path.clone());
        }
    }

    let mut spec = FieldSpec {
        name: name.to_string(),
        path,
        field_type,
        lookups,
        default_lookup,
        nested_scopes,
        children: Vec::new(),
    };

    if field_type != FieldType::Normal {
        spec.children = build_field_specs(&definition.properties, document, Some(&spec))?;
    }
    Ok(spec)
}

/// Resolves an argument object against `specs`.
///
/// Grouping fields recurse into their children. For leaf fields a bare value
/// yields a request without a lookup; an object maps lookup names (or
/// [`DEFAULT_LOOKUP_KEY`]) to values. Lookups outside a field's allowed set
/// are dropped.
pub fn collect_requests(
    specs: &[FieldSpec],
    arguments: &Value,
) -> Result<Vec<LookupRequest>, ValidationError> {
    let Some(arguments) = arguments.as_object() else {
        return Err(ValidationError::InvalidArgument {
            argument: "filter".to_string(),
            message: "expected an object".to_string(),
        });
    };

    let mut requests = Vec::new();
    for (name, value) in arguments {
        if value.is_null() {
            continue;
        }
        let Some(spec) = specs.iter().find(|s| &s.name == name) else {
            tracing::debug!(field = %name, "Ignoring unknown filter field");
            continue;
        };

        if spec.has_children() {
            requests.extend(collect_requests(&spec.children, value)?);
        } else {
            requests.extend(field_requests(spec, value)?);
        }
    }
    Ok(requests)
}

fn field_requests(spec: &FieldSpec, value: &Value) -> Result<Vec<LookupRequest>, ValidationError> {
    let request = |lookup: Option<LookupKind>, value: &Value| {
        LookupRequest::new(spec.path.clone(), lookup, value.clone())
            .with_nested_scopes(spec.nested_scopes.clone())
    };

    let Some(lookups) = value.as_object() else {
        return Ok(vec![request(None, value)]);
    };

    let mut requests = Vec::new();
    for (name, lookup_value) in lookups {
        if lookup_value.is_null() {
            continue;
        }
        let lookup = if name == DEFAULT_LOOKUP_KEY {
            spec.default_lookup
        } else {
            resolve_lookup(&spec.name, Some(name))?
        };
        if !spec.allows(lookup) {
            tracing::debug!(field = %spec.name, lookup = %lookup, "Dropping disallowed lookup");
            continue;
        }
        requests.push(request(Some(lookup), lookup_value));
    }
    Ok(requests)
}
