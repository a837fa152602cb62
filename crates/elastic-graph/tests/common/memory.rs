//! In-memory search client.
//!
//! Evaluates the query DSL subset the backends emit against a fixed set of
//! source documents: `bool`, `match_all`, `term`, `terms`, `range`,
//! `exists`, `prefix`, `wildcard`, `match` and `nested` queries, plus
//! `sort`, `from`/`size` and filter-scoped `terms` aggregations.
//!
//! Multi-field paths (`title.raw`) resolve to their parent value. Any query
//! outside the subset panics so a test never passes on a silently ignored
//! clause.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use helios_elastic_graph::SearchClient;
use helios_elastic_graph::error::SearchError;
use helios_elastic_graph::types::{SearchHit, SearchResponse};
use regex::Regex;
use serde_json::{Map, Value, json};

const MULTI_FIELD_SUFFIXES: [&str; 2] = [".raw", ".keyword"];

/// Which client operation received a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A `_count` request.
    Count,
    /// A `_search` request.
    Search,
    /// A document fetch.
    Get,
}

/// A search client over in-memory documents.
#[derive(Debug, Default)]
pub struct MemoryClient {
    documents: Vec<(String, Value)>,
    requests: Mutex<Vec<(Operation, Value)>>,
    unavailable: bool,
}

impl MemoryClient {
    /// Creates a client holding `documents` as (id, source) pairs.
    pub fn new(documents: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            documents: documents.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Creates a client whose every call fails as unreachable.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<(Operation, Value)> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the body of the last search request.
    pub fn last_search(&self) -> Option<Value> {
        self.requests()
            .into_iter()
            .rev()
            .find(|(op, _)| *op == Operation::Search)
            .map(|(_, body)| body)
    }

    fn record(&self, operation: Operation, body: Value) -> Result<(), SearchError> {
        self.requests.lock().unwrap().push((operation, body));
        if self.unavailable {
            return Err(SearchError::Unavailable {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn matching(&self, body: &Value) -> Vec<&(String, Value)> {
        let query = body
            .get("query")
            .filter(|q| !q.is_null())
            .cloned()
            .unwrap_or(json!({ "match_all": {} }));
        let post_filter = body.get("post_filter");
        self.documents
            .iter()
            .filter(|(_, source)| matches(&query, source))
            .filter(|(_, source)| post_filter.is_none_or(|f| matches(f, source)))
            .collect()
    }
}

#[async_trait]
impl SearchClient for MemoryClient {
    async fn search(&self, _index: &str, body: &Value) -> Result<SearchResponse, SearchError> {
        self.record(Operation::Search, body.clone())?;

        // aggregations see the query matches, not the post filter
        let query_only = json!({ "query": body.get("query").cloned().unwrap_or(Value::Null) });
        let aggregations = body
            .get("aggs")
            .and_then(Value::as_object)
            .map(|aggs| self.aggregate(aggs, &query_only));

        let mut hits = self.matching(body);
        if let Some(sort) = body.get("sort").and_then(Value::as_array) {
            hits.sort_by(|(_, a), (_, b)| compare_sources(sort, a, b));
        }
        let total = hits.len() as u64;
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        let hits = hits
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, source)| {
                let mut hit = SearchHit::new(id.clone(), source.clone());
                hit.score = Some(1.0);
                hit
            })
            .collect();

        Ok(SearchResponse {
            total,
            hits,
            aggregations,
            suggest: None,
        })
    }

    async fn count(&self, _index: &str, body: &Value) -> Result<u64, SearchError> {
        self.record(Operation::Count, body.clone())?;
        Ok(self.matching(body).len() as u64)
    }

    async fn get(&self, _index: &str, id: &str) -> Result<Option<SearchHit>, SearchError> {
        self.record(Operation::Get, json!({ "id": id }))?;
        Ok(self
            .documents
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(id, source)| SearchHit::new(id.clone(), source.clone())))
    }
}

impl MemoryClient {
    fn aggregate(&self, aggs: &Map<String, Value>, query_only: &Value) -> Value {
        let mut results = Map::new();
        for (name, aggregation) in aggs {
            let scope: Vec<&Value> = if aggregation.get("global").is_some() {
                self.documents.iter().map(|(_, source)| source).collect()
            } else {
                let filter = aggregation
                    .get("filter")
                    .cloned()
                    .unwrap_or(json!({ "match_all": {} }));
                self.matching(query_only)
                    .into_iter()
                    .map(|(_, source)| source)
                    .filter(|source| matches(&filter, source))
                    .collect()
            };

            let mut scoped = Map::new();
            scoped.insert("doc_count".to_string(), json!(scope.len()));
            if let Some(inner) = aggregation.get("aggs").and_then(Value::as_object) {
                for (inner_name, inner_agg) in inner {
                    scoped.insert(inner_name.clone(), terms_buckets(inner_agg, &scope));
                }
            }
            results.insert(name.clone(), Value::Object(scoped));
        }
        Value::Object(results)
    }
}

fn terms_buckets(aggregation: &Value, scope: &[&Value]) -> Value {
    let field = aggregation["terms"]["field"]
        .as_str()
        .unwrap_or_else(|| panic!("unsupported aggregation: {aggregation}"));

    let mut counts: Vec<(Value, u64)> = Vec::new();
    for source in scope {
        for value in field_values(source, field) {
            match counts.iter_mut().find(|(key, _)| *key == value) {
                Some((_, count)) => *count += 1,
                None => counts.push((value, 1)),
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| compare_values(&a.0, &b.0)));

    let buckets: Vec<Value> = counts
        .into_iter()
        .map(|(key, doc_count)| json!({ "key": key, "doc_count": doc_count }))
        .collect();
    json!({ "buckets": buckets })
}

/// Returns true if `source` satisfies `query`.
pub fn matches(query: &Value, source: &Value) -> bool {
    let (kind, body) = single_entry(query);
    match kind {
        "match_all" => true,
        "bool" => matches_bool(body, source),
        "term" => {
            let (field, expected) = single_entry(body);
            let expected = expected.get("value").unwrap_or(expected);
            field_values(source, field)
                .iter()
                .any(|v| values_equal(v, expected))
        }
        "terms" => {
            let (field, expected) = single_entry(body);
            let expected = expected.as_array().cloned().unwrap_or_default();
            field_values(source, field)
                .iter()
                .any(|v| expected.iter().any(|e| values_equal(v, e)))
        }
        "range" => {
            let (field, bounds) = single_entry(body);
            field_values(source, field)
                .iter()
                .any(|v| in_range(v, bounds))
        }
        "exists" => {
            let field = body["field"].as_str().unwrap_or_default();
            field_values(source, field).iter().any(|v| !v.is_null())
        }
        "prefix" => {
            let (field, prefix) = single_entry(body);
            let prefix = prefix.as_str().unwrap_or_default();
            field_values(source, field)
                .iter()
                .filter_map(Value::as_str)
                .any(|v| v.starts_with(prefix))
        }
        "wildcard" => {
            let (field, pattern) = single_entry(body);
            let pattern = wildcard_regex(pattern.as_str().unwrap_or_default());
            field_values(source, field)
                .iter()
                .filter_map(Value::as_str)
                .any(|v| pattern.is_match(v))
        }
        "match" => {
            let (field, params) = single_entry(body);
            let text = params.get("query").unwrap_or(params);
            let wanted = tokens(text.as_str().unwrap_or_default());
            field_values(source, field)
                .iter()
                .filter_map(Value::as_str)
                .any(|v| tokens(v).iter().any(|t| wanted.contains(t)))
        }
        "nested" => {
            let path = body["path"].as_str().unwrap_or_default();
            field_values(source, path)
                .into_iter()
                .any(|entry| matches(&body["query"], &scoped_source(source, path, entry)))
        }
        other => panic!("unsupported query `{other}`: {query}"),
    }
}

fn matches_bool(body: &Value, source: &Value) -> bool {
    let clauses = |name: &str| body.get(name).and_then(Value::as_array).cloned().unwrap_or_default();

    let must = clauses("must");
    let filter = clauses("filter");
    let should = clauses("should");
    let must_not = clauses("must_not");

    let minimum_should_match = body
        .get("minimum_should_match")
        .and_then(Value::as_u64)
        .unwrap_or(if must.is_empty() && filter.is_empty() { 1 } else { 0 });

    must.iter().chain(filter.iter()).all(|c| matches(c, source))
        && !must_not.iter().any(|c| matches(c, source))
        && (should.is_empty()
            || should.iter().filter(|c| matches(c, source)).count() as u64 >= minimum_should_match)
}

fn single_entry(value: &Value) -> (&str, &Value) {
    value
        .as_object()
        .and_then(|map| map.iter().next())
        .map(|(k, v)| (k.as_str(), v))
        .unwrap_or_else(|| panic!("expected a single-key object: {value}"))
}

/// Collects every value at a dotted path, flattening arrays on the way.
pub fn field_values(source: &Value, path: &str) -> Vec<Value> {
    let path = MULTI_FIELD_SUFFIXES
        .iter()
        .find_map(|suffix| path.strip_suffix(suffix))
        .unwrap_or(path);

    let mut current = vec![source.clone()];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .filter_map(|v| v.get(segment).cloned())
            .flat_map(|v| match v {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect();
    }
    current
}

/// Replaces the array at `path` with the single `entry` so that queries
/// inside a nested scope only see one element.
fn scoped_source(source: &Value, path: &str, entry: Value) -> Value {
    let mut scoped = source.clone();
    let mut target = &mut scoped;
    for segment in path.split('.') {
        target = &mut target[segment];
    }
    *target = entry;
    scoped
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let check = |op: &str, accept: fn(Ordering) -> bool| {
        bounds
            .get(op)
            .is_none_or(|bound| accept(compare_values(value, bound)))
    };
    check("gt", |o| o == Ordering::Greater)
        && check("gte", |o| o != Ordering::Less)
        && check("lt", |o| o == Ordering::Less)
        && check("lte", |o| o != Ordering::Greater)
}

fn compare_sources(sort: &[Value], a: &Value, b: &Value) -> Ordering {
    for clause in sort {
        let (field, params) = single_entry(clause);
        let first = |source: &Value| field_values(source, field).into_iter().next();
        let ordering = compare_values(
            &first(a).unwrap_or(Value::Null),
            &first(b).unwrap_or(Value::Null),
        );
        let ordering = match params["order"].as_str() {
            Some("desc") => ordering.reverse(),
            _ => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn wildcard_regex(pattern: &str) -> Regex {
    let mut expression = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    Regex::new(&expression).unwrap()
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
