//! The per-request query accumulator.
//!
//! A [`QueryBuilder`] is owned by exactly one resolution call. Backends
//! receive it by value, add their clauses and hand it back; the final
//! [`EsQuery`] body is produced once every backend has run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::lookup::{Clause, Occur};

/// A complete engine query body ready to be sent.
#[derive(Debug, Clone)]
pub struct EsQuery {
    /// The complete query body.
    pub body: Value,
    /// The index to search.
    pub index: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Returns the engine name of this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// Parses `ASC`/`DESC` in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Stored-field restriction for returned hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceFilter {
    /// Only these fields.
    Fields(Vec<String>),
    /// Include and exclude patterns.
    Patterns {
        #[serde(default)]
        includes: Vec<String>,
        #[serde(default)]
        excludes: Vec<String>,
    },
}

/// Mutable accumulator for one request's query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryBuilder {
    index: String,
    must: Vec<Value>,
    filter: Vec<Value>,
    post_filter: Vec<Value>,
    sort: Vec<Value>,
    aggs: Map<String, Value>,
    highlight: Map<String, Value>,
    source: Option<SourceFilter>,
    suggest: Map<String, Value>,
    from: Option<u64>,
    size: Option<u64>,
}

impl QueryBuilder {
    /// Creates an empty builder targeting `index`.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            ..Default::default()
        }
    }

    /// Returns the target index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Adds a compiled clause to the context it declares.
    pub fn add_clause(&mut self, clause: Clause) {
        match clause.occur {
            Occur::Must => self.must.push(clause.body),
            Occur::Filter => self.filter.push(clause.body),
        }
    }

    /// Adds a scored clause.
    pub fn add_must(&mut self, clause: Value) {
        self.must.push(clause);
    }

    /// Adds a filter-context clause.
    pub fn add_filter(&mut self, clause: Value) {
        self.filter.push(clause);
    }

    /// Adds a group of alternatives; at least one must match.
    pub fn add_should(&mut self, clauses: Vec<Value>) {
        if clauses.is_empty() {
            return;
        }
        self.must.push(json!({
            "bool": {
                "should": clauses,
                "minimum_should_match": 1
            }
        }));
    }

    /// Adds a clause applied after aggregations are computed.
    pub fn add_post_filter(&mut self, clause: Value) {
        self.post_filter.push(clause);
    }

    /// Appends a sort clause.
    pub fn add_sort(&mut self, field: &str, order: SortOrder) {
        self.sort.push(json!({ field: { "order": order.as_str() } }));
    }

    /// Returns true once any sort clause has been added.
    pub fn has_sort(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Returns the accumulated sort clauses.
    pub fn sort(&self) -> &[Value] {
        &self.sort
    }

    /// Adds a named top-level aggregation.
    pub fn add_aggregation(&mut self, name: impl Into<String>, aggregation: Value) {
        self.aggs.insert(name.into(), aggregation);
    }

    /// Returns the aggregation tree.
    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggs
    }

    /// Enables highlighting of `field` with the given options.
    pub fn add_highlight(&mut self, field: impl Into<String>, options: Value) {
        self.highlight.insert(field.into(), options);
    }

    /// Restricts returned stored fields.
    pub fn set_source(&mut self, source: SourceFilter) {
        self.source = Some(source);
    }

    /// Adds a named suggester.
    pub fn add_suggester(&mut self, name: impl Into<String>, suggester: Value) {
        self.suggest.insert(name.into(), suggester);
    }

    /// Restricts the hit window.
    pub fn set_window(&mut self, from: u64, size: u64) {
        self.from = Some(from);
        self.size = Some(size);
    }

    fn build_query(&self) -> Value {
        if self.must.is_empty() && self.filter.is_empty() {
            return json!({ "match_all": {} });
        }

        let mut bool_query = Map::new();
        if !self.must.is_empty() {
            bool_query.insert("must".to_string(), json!(self.must));
        }
        if !self.filter.is_empty() {
            bool_query.insert("filter".to_string(), json!(self.filter));
        }
        json!({ "bool": bool_query })
    }

    /// Builds the full search body.
    pub fn build(&self) -> EsQuery {
        let mut body = json!({
            "query": self.build_query(),
        });

        match self.post_filter.as_slice() {
            [] => {}
            [single] => body["post_filter"] = single.clone(),
            many => body["post_filter"] = json!({ "bool": { "filter": many } }),
        }

        if !self.sort.is_empty() {
            body["sort"] = json!(self.sort);
        }
        if !self.aggs.is_empty() {
            body["aggs"] = Value::Object(self.aggs.clone());
        }
        if !self.highlight.is_empty() {
            body["highlight"] = json!({ "fields": self.highlight });
        }
        if let Some(source) = &self.source {
            body["_source"] = json!(source);
        }
        if !self.suggest.is_empty() {
            body["suggest"] = Value::Object(self.suggest.clone());
        }
        if let Some(from) = self.from {
            body["from"] = json!(from);
        }
        if let Some(size) = self.size {
            body["size"] = json!(size);
        }
        body["track_total_hits"] = json!(true);

        EsQuery {
            body,
            index: self.index.clone(),
        }
    }

    /// Builds a count body: the query and post filter only.
    ///
    /// The post filter narrows the hits a page is cut from, so it takes part
    /// in the count as a filter clause.
    pub fn build_count(&self) -> EsQuery {
        let mut counted = QueryBuilder::new(self.index.clone());
        counted.must = self.must.clone();
        counted.filter = self.filter.clone();
        counted.filter.extend(self.post_filter.iter().cloned());

        EsQuery {
            body: json!({ "query": counted.build_query() }),
            index: self.index.clone(),
        }
    }
}
