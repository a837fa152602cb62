//! Filtering backend and the field machinery shared by the post and nested
//! filtering backends.

use std::collections::BTreeMap;

use serde_json::Value;

use super::FilterBackend;
use crate::config::{ConnectionSettings, FieldOptions};
use crate::error::{ConfigurationError, ValidationError};
use crate::lookup::{DEFAULT_LOOKUP_KEY, build_field_specs, collect_requests, compile_request};
use crate::registry::DocumentFields;
use crate::types::{
    ArgumentDescriptor, ArgumentKind, Clause, FieldSpec, LookupKind, QueryBuilder, ScalarType,
};

/// Resolved filter fields plus the separator their values are split on.
#[derive(Debug, Clone)]
pub(crate) struct FieldFilter {
    specs: Vec<FieldSpec>,
    separator: String,
}

impl FieldFilter {
    pub(crate) fn new(specs: Vec<FieldSpec>, settings: &ConnectionSettings) -> Self {
        Self {
            specs,
            separator: settings.value_separator.clone(),
        }
    }

    pub(crate) fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub(crate) fn belongs_to(&self, field_name: &str) -> bool {
        self.specs.iter().any(|s| s.name == field_name)
    }

    /// Describes the bucket `prefix`. Fields whose document field did not
    /// convert to a schema type are left out; an empty bucket contributes
    /// nothing.
    pub(crate) fn descriptors(
        &self,
        prefix: &str,
        document: &DocumentFields,
    ) -> Vec<ArgumentDescriptor> {
        let fields: Vec<ArgumentDescriptor> = self
            .specs
            .iter()
            .filter(|spec| document.is_filterable(root_field(&spec.path)))
            .map(|spec| field_descriptor(spec, document))
            .collect();

        if fields.is_empty() {
            return Vec::new();
        }
        vec![ArgumentDescriptor::new(prefix, ArgumentKind::object(fields))]
    }

    /// Compiles every lookup in `bucket`.
    pub(crate) fn clauses(&self, bucket: &Value) -> Result<Vec<Clause>, ValidationError> {
        collect_requests(&self.specs, bucket)?
            .iter()
            .map(|request| compile_request(request, &self.separator))
            .collect()
    }
}

fn root_field(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

fn field_descriptor(spec: &FieldSpec, document: &DocumentFields) -> ArgumentDescriptor {
    if spec.has_children() {
        let children = spec
            .children
            .iter()
            .map(|child| field_descriptor(child, document))
            .collect();
        return ArgumentDescriptor::new(&spec.name, ArgumentKind::object(children));
    }

    let scalar = document
        .path_scalar_type(&spec.path)
        .or_else(|| document.scalar_type(root_field(&spec.path)))
        .unwrap_or(ScalarType::String);

    let mut lookups: Vec<ArgumentDescriptor> = spec
        .lookups
        .iter()
        .map(|lookup| ArgumentDescriptor::new(lookup.as_str(), lookup_argument(*lookup, scalar)))
        .collect();
    lookups.push(ArgumentDescriptor::new(
        DEFAULT_LOOKUP_KEY,
        lookup_argument(spec.default_lookup, scalar),
    ));

    ArgumentDescriptor::new(&spec.name, ArgumentKind::Lookups { scalar, lookups })
}

/// Argument shape of one lookup on a field of type `scalar`.
fn lookup_argument(lookup: LookupKind, scalar: ScalarType) -> ArgumentKind {
    match lookup {
        LookupKind::Term | LookupKind::Prefix | LookupKind::StartsWith => {
            ArgumentKind::scalar(scalar)
        }
        LookupKind::Wildcard | LookupKind::Contains | LookupKind::EndsWith => {
            ArgumentKind::scalar(ScalarType::String)
        }
        LookupKind::Terms | LookupKind::In | LookupKind::Exclude => match scalar {
            // strings may carry separator-encoded values
            ScalarType::String => ArgumentKind::list(ArgumentKind::scalar(ScalarType::String)),
            _ => ArgumentKind::list(ArgumentKind::Any),
        },
        LookupKind::Range => ArgumentKind::object(vec![
            ArgumentDescriptor::new("lower", ArgumentKind::Any).required(),
            ArgumentDescriptor::new("upper", ArgumentKind::Any),
            ArgumentDescriptor::new("boost", ArgumentKind::scalar(ScalarType::Float)),
        ]),
        LookupKind::Exists | LookupKind::IsNull => ArgumentKind::scalar(ScalarType::Boolean),
        LookupKind::Gt
        | LookupKind::Gte
        | LookupKind::Lt
        | LookupKind::Lte
        | LookupKind::GeoDistance
        | LookupKind::GeoPolygon
        | LookupKind::GeoBoundingBox => ArgumentKind::Any,
    }
}

/// Adds lookup clauses to the main query, in the boolean context each
/// lookup declares.
#[derive(Debug, Clone)]
pub struct FilteringBackend {
    fields: FieldFilter,
}

impl FilteringBackend {
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

    /// Returns the resolved field specs.
    pub fn fields(&self) -> &[FieldSpec] {
        self.fields.specs()
    }
}

impl FilterBackend for FilteringBackend {
    fn name(&self) -> &str {
        "filtering"
    }

    fn prefix(&self) -> &str {
        "filter"
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
            builder.add_clause(clause);
        }
        Ok(builder)
    }
}
