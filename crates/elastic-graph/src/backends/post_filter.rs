//! Post-filtering backend.

use std::collections::BTreeMap;

use serde_json::Value;

use super::FilterBackend;
use super::filtering::FieldFilter;
use crate::config::{ConnectionSettings, FieldOptions};
use crate::error::{ConfigurationError, ValidationError};
use crate::lookup::build_field_specs;
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, QueryBuilder};

/// Filters hits after aggregations are computed, so facet counts are not
/// narrowed by these lookups.
#[derive(Debug, Clone)]
pub struct PostFilteringBackend {
    fields: FieldFilter,
}

impl PostFilteringBackend {
    /// Resolves `options` against `document`.
    pub fn new(
        options: &BTreeMap<String, FieldOptions>,
        document: &DocumentFields,
        settings: &ConnectionSettings,
    ) -> Result<Self, ConfigurationError> {
        let specs = build_field_specs(options, Some(document), None)?;
        Ok(Self {
            fields: FieldFilter::new(specs, settings),
        })
    }
}

impl FilterBackend for PostFilteringBackend {
    fn name(&self) -> &str {
        "post_filtering"
    }

    fn prefix(&self) -> &str {
        "postFilter"
    }

    fn contributed_fields(&self, document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        self.fields.descriptors(self.prefix(), document)
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.fields.belongs_to(field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let Some(bucket) = bucket else {
            return Ok(builder);
        };
        for clause in self.fields.clauses(bucket)? {
            builder.add_post_filter(clause.body);
        }
        Ok(builder)
    }
}
