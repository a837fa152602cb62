//! Faceted search and aggregations backends.
//!
//! Each configured facet becomes one aggregation named `_filter_{name}`. The
//! outer aggregation sets the scope (`global`, or a `match_all` filter) and
//! holds the bucket aggregation `{name}` of the facet's kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, ArgumentKind, ConnectionExtras, QueryBuilder, SearchResponse};

/// Bucket aggregation kind of a facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    #[default]
    Terms,
    DateHistogram,
    Range,
}

impl FacetKind {
    /// Returns the engine aggregation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Terms => "terms",
            FacetKind::DateHistogram => "date_histogram",
            FacetKind::Range => "range",
        }
    }
}

/// Configuration of one facet. A bare string is the engine field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetOptions {
    Path(String),
    Detailed(FacetDefinition),
}

/// Detailed facet configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetDefinition {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub facet: FacetKind,
    /// Options of the bucket aggregation (`size`, `interval`, `ranges`, ...).
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Compute on every request, requested or not.
    #[serde(default)]
    pub enabled: bool,
    /// Ignore the query when computing buckets.
    #[serde(default)]
    pub global: bool,
}

const INTERVAL_OPTIONS: [&str; 3] = ["interval", "calendar_interval", "fixed_interval"];

#[derive(Debug, Clone)]
struct Facet {
    name: String,
    definition: FacetDefinition,
    path: String,
}

impl Facet {
    fn aggregation_name(&self) -> String {
        format!("_filter_{}", self.name)
    }

    fn aggregation(&self) -> Value {
        let mut params = Map::new();
        params.insert("field".to_string(), json!(self.path));
        params.extend(self.definition.options.clone());

        let inner = json!({ self.name.clone(): { self.definition.facet.as_str(): params } });
        if self.definition.global {
            json!({ "global": {}, "aggs": inner })
        } else {
            json!({ "filter": { "match_all": {} }, "aggs": inner })
        }
    }
}

/// Facet handling shared by both backends.
#[derive(Debug, Clone)]
struct FacetSet {
    facets: Vec<Facet>,
}

impl FacetSet {
    fn new(options: &BTreeMap<String, Option<FacetOptions>>) -> Result<Self, ConfigurationError> {
        let mut facets = Vec::with_capacity(options.len());
        for (name, options) in options {
            let definition = match options {
                None => FacetDefinition::default(),
                Some(FacetOptions::Path(path)) => FacetDefinition {
                    field: Some(path.clone()),
                    ..Default::default()
                },
                Some(FacetOptions::Detailed(definition)) => definition.clone(),
            };
            let path = definition.field.clone().unwrap_or_else(|| name.clone());
            validate_field_path(name, &path)?;

            match definition.facet {
                FacetKind::DateHistogram
                    if !INTERVAL_OPTIONS
                        .iter()
                        .any(|o| definition.options.contains_key(*o)) =>
                {
                    return Err(ConfigurationError::MissingFacetOption {
                        facet: name.clone(),
                        option: "interval".to_string(),
                    });
                }
                FacetKind::Range if !definition.options.contains_key("ranges") => {
                    return Err(ConfigurationError::MissingFacetOption {
                        facet: name.clone(),
                        option: "ranges".to_string(),
                    });
                }
                _ => {}
            }

            facets.push(Facet {
                name: name.clone(),
                definition,
                path,
            });
        }
        Ok(Self { facets })
    }

    fn descriptors(&self, prefix: &str) -> Vec<ArgumentDescriptor> {
        if self.facets.is_empty() {
            return Vec::new();
        }
        let names = self.facets.iter().map(|f| f.name.clone());
        vec![ArgumentDescriptor::new(
            prefix,
            ArgumentKind::list(ArgumentKind::enumeration(names)),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.facets.iter().any(|f| f.name == field_name)
    }

    fn apply(
        &self,
        prefix: &str,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let requested: Vec<&str> = match bucket {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(name)) => vec![name.as_str()],
            _ => Vec::new(),
        };
        if let Some(unknown) = requested.iter().find(|name| !self.belongs_to(name)) {
            return Err(ValidationError::InvalidArgument {
                argument: prefix.to_string(),
                message: format!("`{unknown}` is not a configured facet"),
            });
        }

        for facet in &self.facets {
            if facet.definition.enabled || requested.contains(&facet.name.as_str()) {
                builder.add_aggregation(facet.aggregation_name(), facet.aggregation());
            }
        }
        Ok(builder)
    }

    /// Unwraps the scoped aggregations of every facet present in `response`.
    fn results(&self, response: &SearchResponse) -> Option<Value> {
        let aggregations = response.aggregations.as_ref()?;
        let mut results = Map::new();
        for facet in &self.facets {
            if let Some(result) = aggregations
                .get(facet.aggregation_name())
                .and_then(|scope| scope.get(&facet.name))
            {
                results.insert(facet.name.clone(), result.clone());
            }
        }
        Some(Value::Object(results))
    }
}

/// Facet buckets requested through the `facets` argument and attached to the
/// connection under `facets`.
#[derive(Debug, Clone)]
pub struct FacetedSearchBackend {
    facets: FacetSet,
}

impl FacetedSearchBackend {
    /// Validates the configured facets.
    pub fn new(options: &BTreeMap<String, Option<FacetOptions>>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            facets: FacetSet::new(options)?,
        })
    }
}

impl FilterBackend for FacetedSearchBackend {
    fn name(&self) -> &str {
        "faceted_search"
    }

    fn prefix(&self) -> &str {
        "facets"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        self.facets.descriptors(self.prefix())
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.facets.belongs_to(field_name)
    }

    fn filter(
        &self,
        builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        self.facets.apply(self.prefix(), builder, bucket)
    }

    fn alter_connection(&self, response: &SearchResponse, extras: &mut ConnectionExtras) {
        if let Some(results) = self.facets.results(response) {
            extras.insert("facets".to_string(), results);
        }
    }
}

/// Same buckets as [`FacetedSearchBackend`] under the `aggregations`
/// argument; the raw response aggregations are attached under
/// `aggregations`.
#[derive(Debug, Clone)]
pub struct AggregationsBackend {
    facets: FacetSet,
}

impl AggregationsBackend {
    /// Validates the configured aggregations.
    pub fn new(options: &BTreeMap<String, Option<FacetOptions>>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            facets: FacetSet::new(options)?,
        })
    }
}

impl FilterBackend for AggregationsBackend {
    fn name(&self) -> &str {
        "aggregations"
    }

    fn prefix(&self) -> &str {
        "aggregations"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        self.facets.descriptors(self.prefix())
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.facets.belongs_to(field_name)
    }

    fn filter(
        &self,
        builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        self.facets.apply(self.prefix(), builder, bucket)
    }

    fn alter_connection(&self, response: &SearchResponse, extras: &mut ConnectionExtras) {
        if let Some(aggregations) = &response.aggregations {
            extras.insert("aggregations".to_string(), aggregations.clone());
        }
    }
}
