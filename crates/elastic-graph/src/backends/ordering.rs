//! Ordering and default ordering backends.

use std::collections::BTreeMap;

use serde_json::Value;

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, ArgumentKind, QueryBuilder, SortOrder};

const DIRECTIONS: [&str; 2] = ["ASC", "DESC"];

/// Sorts by the requested fields, in request order.
#[derive(Debug, Clone)]
pub struct OrderingBackend {
    fields: BTreeMap<String, String>,
}

impl OrderingBackend {
    /// `fields` maps argument names to engine field paths.
    pub fn new(fields: &BTreeMap<String, String>) -> Result<Self, ConfigurationError> {
        for (name, path) in fields {
            validate_field_path(name, path)?;
        }
        Ok(Self {
            fields: fields.clone(),
        })
    }
}

impl FilterBackend for OrderingBackend {
    fn name(&self) -> &str {
        "ordering"
    }

    fn prefix(&self) -> &str {
        "ordering"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        if self.fields.is_empty() {
            return Vec::new();
        }
        let fields = self
            .fields
            .keys()
            .map(|name| ArgumentDescriptor::new(name, ArgumentKind::enumeration(DIRECTIONS)))
            .collect();
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::object(fields),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.fields.contains_key(field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let Some(bucket) = bucket.and_then(Value::as_object) else {
            return Ok(builder);
        };

        for (name, direction) in bucket.iter().filter(|(_, v)| !v.is_null()) {
            let Some(path) = self.fields.get(name) else {
                tracing::debug!(field = %name, "Ignoring unknown ordering field");
                continue;
            };
            let order = direction
                .as_str()
                .and_then(SortOrder::parse)
                .ok_or_else(|| ValidationError::InvalidArgument {
                    argument: format!("ordering.{name}"),
                    message: format!("expected one of {DIRECTIONS:?}"),
                })?;
            builder.add_sort(path, order);
        }
        Ok(builder)
    }
}

/// Applies a fixed ordering when nothing else sorted the query.
#[derive(Debug, Clone)]
pub struct DefaultOrderingBackend {
    defaults: Vec<(String, SortOrder)>,
}

impl DefaultOrderingBackend {
    /// `defaults` are argument names, `-` prefixed for descending order.
    /// They are translated through `fields` only when every one of them is
    /// a known ordering argument; otherwise they are engine paths.
    pub fn new(
        defaults: &[String],
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let parsed: Vec<(&str, SortOrder)> = defaults
            .iter()
            .map(|entry| match entry.strip_prefix('-') {
                Some(name) => (name, SortOrder::Desc),
                None => (entry.as_str(), SortOrder::Asc),
            })
            .collect();

        let translate = parsed.iter().all(|(name, _)| fields.contains_key(*name));
        let mut resolved = Vec::with_capacity(parsed.len());
        for (name, order) in parsed {
            let path = match fields.get(name) {
                Some(path) if translate => path.clone(),
                _ => name.to_string(),
            };
            validate_field_path(name, &path)?;
            resolved.push((path, order));
        }
        Ok(Self { defaults: resolved })
    }

    /// Returns the resolved (engine path, order) pairs.
    pub fn defaults(&self) -> &[(String, SortOrder)] {
        &self.defaults
    }
}

impl FilterBackend for DefaultOrderingBackend {
    fn name(&self) -> &str {
        "default_ordering"
    }

    fn prefix(&self) -> &str {
        "ordering"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        Vec::new()
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.defaults.iter().any(|(path, _)| path == field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        _bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        if builder.has_sort() {
            return Ok(builder);
        }
        for (path, order) in &self.defaults {
            builder.add_sort(path, *order);
        }
        Ok(builder)
    }
}
