//! Search responses and resolved connection pages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pagination::PageWindow;
use crate::error::SearchError;

/// One hit returned by the search client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub source: Value,
    #[serde(default)]
    pub highlight: Option<Value>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub sort: Vec<Value>,
}

impl SearchHit {
    /// Creates a hit with only an id and stored fields.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
            ..Default::default()
        }
    }

    /// Parses one entry of `hits.hits`.
    pub fn from_body(hit: &Value) -> Result<Self, SearchError> {
        let id = hit
            .get("_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SearchError::InvalidResponse {
                message: "hit without _id".to_string(),
            })?;

        Ok(Self {
            id: id.to_string(),
            source: hit.get("_source").cloned().unwrap_or(Value::Null),
            highlight: hit.get("highlight").cloned(),
            score: hit.get("_score").and_then(|s| s.as_f64()),
            sort: hit
                .get("sort")
                .and_then(|s| s.as_array())
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// The result of one search round-trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub aggregations: Option<Value>,
    #[serde(default)]
    pub suggest: Option<Value>,
}

impl SearchResponse {
    /// Parses a raw engine response body.
    pub fn from_body(body: &Value) -> Result<Self, SearchError> {
        let hits = body.get("hits").ok_or_else(|| SearchError::InvalidResponse {
            message: "response has no hits section".to_string(),
        })?;

        let total = match hits.get("total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(total) => total.get("value").and_then(|v| v.as_u64()).unwrap_or(0),
            None => 0,
        };

        let hits = hits
            .get("hits")
            .and_then(|h| h.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(SearchHit::from_body)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            total,
            hits,
            aggregations: body.get("aggregations").cloned(),
            suggest: body.get("suggest").cloned(),
        })
    }
}

/// Node-level output fields a backend can contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputField {
    /// Highlight fragments from hit metadata.
    Highlight,
    /// Relevance score from hit metadata.
    Score,
}

/// One resolved node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub source: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sort: Vec<Value>,
}

impl Node {
    /// Builds a node from a hit, keeping only the requested output fields.
    pub fn from_hit(hit: SearchHit, outputs: &[OutputField]) -> Self {
        Self {
            id: hit.id,
            source: hit.source,
            highlight: hit
                .highlight
                .filter(|_| outputs.contains(&OutputField::Highlight)),
            score: hit.score.filter(|_| outputs.contains(&OutputField::Score)),
            sort: hit.sort,
        }
    }

    /// Reads a stored field by dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.source, |value, key| value.get(key))
    }
}

/// Side-channel data attached to a page by backends.
pub type ConnectionExtras = Map<String, Value>;

/// A resolved connection page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPage {
    #[serde(flatten)]
    pub window: PageWindow<Node>,
    pub total: u64,
    #[serde(flatten)]
    pub extras: ConnectionExtras,
}

impl ConnectionPage {
    /// Returns side-channel data attached under `name`.
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    /// Facet aggregations, when a faceted search backend is registered.
    pub fn facets(&self) -> Option<&Value> {
        self.extra("facets")
    }

    /// Suggestions, when a suggest backend is registered.
    pub fn suggestions(&self) -> Option<&Value> {
        self.extra("suggestions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_body() {
        let body = json!({
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    {
                        "_id": "1",
                        "_score": 1.5,
                        "_source": { "title": "Elastic" },
                        "highlight": { "title": ["<em>Elastic</em>"] },
                        "sort": [10]
                    },
                    { "_id": "2", "_source": { "title": "Django" } }
                ]
            },
            "aggregations": { "_filter_category": { "doc_count": 2 } },
            "suggest": { "title_suggest": [] }
        });

        let response = SearchResponse::from_body(&body).unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].score, Some(1.5));
        assert_eq!(response.hits[0].sort, vec![json!(10)]);
        assert!(response.hits[1].highlight.is_none());
        assert!(response.aggregations.is_some());
        assert!(response.suggest.is_some());
    }

    #[test]
    fn test_parse_legacy_total() {
        let body = json!({ "hits": { "total": 7, "hits": [] } });
        assert_eq!(SearchResponse::from_body(&body).unwrap().total, 7);
    }

    #[test]
    fn test_parse_rejects_missing_hits() {
        assert!(SearchResponse::from_body(&json!({ "error": "boom" })).is_err());
        let body = json!({ "hits": { "hits": [{ "_source": {} }] } });
        assert!(SearchResponse::from_body(&body).is_err());
    }

    #[test]
    fn test_node_output_fields() {
        let mut hit = SearchHit::new("1", json!({ "author": { "name": "eli" } }));
        hit.score = Some(2.0);
        hit.highlight = Some(json!({ "title": ["x"] }));

        let node = Node::from_hit(hit.clone(), &[OutputField::Score]);
        assert_eq!(node.score, Some(2.0));
        assert!(node.highlight.is_none());
        assert_eq!(node.get("author.name"), Some(&json!("eli")));

        let node = Node::from_hit(hit, &[]);
        assert!(node.score.is_none());
    }
}
