//! Full-text search backend.
//!
//! Builds `match` clauses for the configured search fields. The `query` key
//! searches every field at once; per-field keys search one field with an
//! optional boost. All clauses are alternatives of a single `should` group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::lookup::{scopes_for_path, wrap_scopes};
use crate::registry::DocumentFields;
use crate::types::{
    ArgumentDescriptor, ArgumentKind, Clause, FieldKind, QueryBuilder, ScalarType,
};

/// Bucket key that searches every configured field.
pub const ALL_FIELDS_KEY: &str = "query";

/// Configuration of one search field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SearchFieldOptions {
    /// Engine field path.
    Path(String),
    /// Engine field path and default boost.
    Detailed {
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        boost: Option<f64>,
    },
    /// Same engine field as the argument name.
    #[default]
    Inherit,
}

/// A search entry covering fields of a nested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedSearchOptions {
    /// Nested document path. Ancestors mapped as `nested` become outer scopes.
    pub path: String,
    /// Fields relative to `path`.
    pub fields: Vec<String>,
    #[serde(default)]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone)]
struct SearchField {
    name: String,
    path: String,
    boost: Option<f64>,
}

#[derive(Debug, Clone)]
struct NestedSearch {
    name: String,
    scopes: Vec<String>,
    paths: Vec<String>,
    boost: Option<f64>,
}

/// Adds boosted `match` alternatives to the query.
#[derive(Debug, Clone)]
pub struct SearchBackend {
    fields: Vec<SearchField>,
    nested: Vec<NestedSearch>,
}

impl SearchBackend {
    /// Validates field paths and nested entries. Nested scopes are read
    /// from `document`'s mapping.
    pub fn new(
        fields: &BTreeMap<String, SearchFieldOptions>,
        nested: &BTreeMap<String, NestedSearchOptions>,
        document: &DocumentFields,
    ) -> Result<Self, ConfigurationError> {
        let mut resolved = Vec::with_capacity(fields.len());
        for (name, options) in fields {
            let (path, boost) = match options {
                SearchFieldOptions::Path(path) => (path.clone(), None),
                SearchFieldOptions::Detailed { field, boost } => {
                    (field.clone().unwrap_or_else(|| name.clone()), *boost)
                }
                SearchFieldOptions::Inherit => (name.clone(), None),
            };
            validate_field_path(name, &path)?;
            resolved.push(SearchField {
                name: name.clone(),
                path,
                boost,
            });
        }

        let mut resolved_nested = Vec::with_capacity(nested.len());
        for (name, options) in nested {
            if name == ALL_FIELDS_KEY || fields.contains_key(name) {
                return Err(ConfigurationError::ArgumentCollision {
                    argument: name.clone(),
                    first: "search_fields".to_string(),
                    second: "search_nested_fields".to_string(),
                });
            }
            validate_field_path(name, &options.path)?;
            let paths = options
                .fields
                .iter()
                .map(|field| {
                    let path = format!("{}.{field}", options.path);
                    validate_field_path(name, &path).map(|_| path)
                })
                .collect::<Result<Vec<_>, _>>()?;
            resolved_nested.push(NestedSearch {
                name: name.clone(),
                scopes: nested_scopes(&options.path, document),
                paths,
                boost: options.boost,
            });
        }

        if resolved.iter().any(|f| f.name == ALL_FIELDS_KEY) {
            return Err(ConfigurationError::ArgumentCollision {
                argument: ALL_FIELDS_KEY.to_string(),
                first: "search".to_string(),
                second: "search_fields".to_string(),
            });
        }

        Ok(Self {
            fields: resolved,
            nested: resolved_nested,
        })
    }

    fn field_clause(path: &str, text: &str, boost: Option<f64>) -> Value {
        let mut params = Map::new();
        params.insert("query".to_string(), json!(text));
        if let Some(boost) = boost {
            params.insert("boost".to_string(), json!(boost));
        }
        json!({ "match": { path: params } })
    }

    fn nested_clauses(entry: &NestedSearch, text: &str, boost: Option<f64>) -> Vec<Value> {
        entry
            .paths
            .iter()
            .map(|path| {
                let clause = Clause::must(Self::field_clause(path, text, boost));
                wrap_scopes(clause, &entry.scopes).body
            })
            .collect()
    }
}

/// Scopes of a nested search path: each ancestor mapped as `nested`, then
/// the path itself.
fn nested_scopes(path: &str, document: &DocumentFields) -> Vec<String> {
    let mut scopes = scopes_for_path(path);
    let own = scopes.pop();
    scopes.retain(|scope| document.field_kind(scope) == Some(&FieldKind::Nested));
    scopes.extend(own);
    scopes
}

/// Reads `"text"` or `{"value": "text", "boost": 2}`.
fn search_value(key: &str, value: &Value) -> Result<(String, Option<f64>), ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidArgument {
        argument: format!("search.{key}"),
        message: message.to_string(),
    };
    let text = |v: &Value| match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid("expected search text")),
    };

    match value {
        Value::Object(map) => {
            let value = map.get("value").ok_or_else(|| invalid("`value` is required"))?;
            let boost = match map.get("boost") {
                None | Some(Value::Null) => None,
                Some(b) => Some(b.as_f64().ok_or_else(|| invalid("boost must be a number"))?),
            };
            Ok((text(value)?, boost))
        }
        other => Ok((text(other)?, None)),
    }
}

fn search_argument(name: &str) -> ArgumentDescriptor {
    ArgumentDescriptor::new(
        name,
        ArgumentKind::Lookups {
            scalar: ScalarType::String,
            lookups: vec![
                ArgumentDescriptor::new("value", ArgumentKind::scalar(ScalarType::String))
                    .required(),
                ArgumentDescriptor::new("boost", ArgumentKind::scalar(ScalarType::Float)),
            ],
        },
    )
}

impl FilterBackend for SearchBackend {
    fn name(&self) -> &str {
        "search"
    }

    fn prefix(&self) -> &str {
        "search"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        if self.fields.is_empty() && self.nested.is_empty() {
            return Vec::new();
        }
        let mut fields = vec![search_argument(ALL_FIELDS_KEY)];
        fields.extend(self.fields.iter().map(|f| search_argument(&f.name)));
        fields.extend(self.nested.iter().map(|n| search_argument(&n.name)));
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::object(fields),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.fields.iter().any(|f| f.name == field_name)
            || self.nested.iter().any(|n| n.name == field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let Some(bucket) = bucket.and_then(Value::as_object) else {
            return Ok(builder);
        };

        let mut should = Vec::new();
        for (key, value) in bucket.iter().filter(|(_, v)| !v.is_null()) {
            let (text, boost) = search_value(key, value)?;
            if key == ALL_FIELDS_KEY {
                for field in &self.fields {
                    should.push(Self::field_clause(&field.path, &text, boost.or(field.boost)));
                }
                for entry in &self.nested {
                    should.extend(Self::nested_clauses(entry, &text, boost.or(entry.boost)));
                }
            } else if let Some(field) = self.fields.iter().find(|f| &f.name == key) {
                should.push(Self::field_clause(&field.path, &text, boost.or(field.boost)));
            } else if let Some(entry) = self.nested.iter().find(|n| &n.name == key) {
                should.extend(Self::nested_clauses(entry, &text, boost.or(entry.boost)));
            } else {
                tracing::debug!(field = %key, "Ignoring unknown search field");
            }
        }

        builder.add_should(should);
        Ok(builder)
    }
}
