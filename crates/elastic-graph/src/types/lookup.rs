//! Lookup kinds, resolved lookup requests and compiled clauses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Comparison semantics requested for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Term,
    Terms,
    Range,
    Exists,
    #[serde(rename = "isnull")]
    IsNull,
    Prefix,
    #[serde(rename = "startswith", alias = "starts_with")]
    StartsWith,
    Wildcard,
    Contains,
    #[serde(rename = "endswith", alias = "ends_with")]
    EndsWith,
    In,
    Exclude,
    Gt,
    Gte,
    Lt,
    Lte,
    GeoDistance,
    GeoPolygon,
    GeoBoundingBox,
}

const ALL_LOOKUPS: [LookupKind; 19] = [
    LookupKind::Term,
    LookupKind::Terms,
    LookupKind::Range,
    LookupKind::Exists,
    LookupKind::IsNull,
    LookupKind::Prefix,
    LookupKind::StartsWith,
    LookupKind::Wildcard,
    LookupKind::Contains,
    LookupKind::EndsWith,
    LookupKind::In,
    LookupKind::Exclude,
    LookupKind::Gt,
    LookupKind::Gte,
    LookupKind::Lt,
    LookupKind::Lte,
    LookupKind::GeoDistance,
    LookupKind::GeoPolygon,
    LookupKind::GeoBoundingBox,
];

impl LookupKind {
    /// Every lookup kind, in declaration order.
    pub fn all() -> &'static [LookupKind] {
        &ALL_LOOKUPS
    }

    /// Returns the argument name of this lookup.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::Term => "term",
            LookupKind::Terms => "terms",
            LookupKind::Range => "range",
            LookupKind::Exists => "exists",
            LookupKind::IsNull => "isnull",
            LookupKind::Prefix => "prefix",
            LookupKind::StartsWith => "startswith",
            LookupKind::Wildcard => "wildcard",
            LookupKind::Contains => "contains",
            LookupKind::EndsWith => "endswith",
            LookupKind::In => "in",
            LookupKind::Exclude => "exclude",
            LookupKind::Gt => "gt",
            LookupKind::Gte => "gte",
            LookupKind::Lt => "lt",
            LookupKind::Lte => "lte",
            LookupKind::GeoDistance => "geo_distance",
            LookupKind::GeoPolygon => "geo_polygon",
            LookupKind::GeoBoundingBox => "geo_bounding_box",
        }
    }

    /// The boolean context a clause of this kind is placed in.
    pub fn occur(&self) -> Occur {
        match self {
            LookupKind::Wildcard
            | LookupKind::Contains
            | LookupKind::EndsWith
            | LookupKind::Exists
            | LookupKind::IsNull
            | LookupKind::In
            | LookupKind::Exclude => Occur::Must,
            _ => Occur::Filter,
        }
    }
}

impl FromStr for LookupKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starts_with" => return Ok(LookupKind::StartsWith),
            "ends_with" => return Ok(LookupKind::EndsWith),
            _ => {}
        }
        ALL_LOOKUPS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean context of a compiled clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occur {
    /// Scored query context.
    Must,
    /// Non-scoring filter context.
    Filter,
}

/// One compiled query clause and the context it belongs in.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub body: Value,
    pub occur: Occur,
}

impl Clause {
    /// Creates a clause for the given context.
    pub fn new(body: Value, occur: Occur) -> Self {
        Self { body, occur }
    }

    /// Creates a scored clause.
    pub fn must(body: Value) -> Self {
        Self::new(body, Occur::Must)
    }

    /// Creates a filter-context clause.
    pub fn filter(body: Value) -> Self {
        Self::new(body, Occur::Filter)
    }
}

/// One resolved filter instruction for a single field.
///
/// `lookup` is `None` when the caller gave a bare value; the compiler then
/// falls back to an exact `term` match.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub field_path: String,
    pub lookup: Option<LookupKind>,
    pub value: Value,
    pub nested_scopes: Vec<String>,
}

impl LookupRequest {
    /// Creates a request outside any nested scope.
    pub fn new(field_path: impl Into<String>, lookup: Option<LookupKind>, value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            lookup,
            value,
            nested_scopes: Vec::new(),
        }
    }

    /// Binds the request to the given nested scopes, outermost first.
    pub fn with_nested_scopes(mut self, scopes: Vec<String>) -> Self {
        self.nested_scopes = scopes;
        self
    }

    /// Returns the lookup kind the compiler will apply.
    pub fn effective_lookup(&self) -> LookupKind {
        self.lookup.unwrap_or(LookupKind::Term)
    }
}

/// A normalized range bound.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Number(Decimal),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    /// Passed through verbatim (date math such as `now-1d/d`).
    Raw(String),
}

impl RangeBound {
    /// Normalizes a JSON scalar into a bound. Returns `None` for non-scalars.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
                .map(RangeBound::Number),
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }

    /// Parses a string bound.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(number) = Decimal::from_str(raw) {
            return RangeBound::Number(number);
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
            return RangeBound::DateTime(datetime.with_timezone(&Utc));
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return RangeBound::Date(date);
        }
        RangeBound::Raw(raw.to_string())
    }

    /// Renders the bound as a query DSL value.
    pub fn to_json(&self) -> Value {
        match self {
            RangeBound::Number(number) => {
                if number.fract().is_zero() {
                    if let Some(int) = number.to_i64() {
                        return json!(int);
                    }
                }
                number.to_f64().map_or_else(|| json!(number.to_string()), |f| json!(f))
            }
            RangeBound::DateTime(datetime) => json!(datetime.to_rfc3339()),
            RangeBound::Date(date) => json!(date.format("%Y-%m-%d").to_string()),
            RangeBound::Raw(raw) => json!(raw),
        }
    }
}
