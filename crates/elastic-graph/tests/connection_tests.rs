//! Connection resolution integration tests.
//!
//! Runs full requests through the fixture connection and the in-memory
//! client: ordering, search, post filters with facets, node output fields
//! and the client error path.

mod common;

use common::*;
use helios_elastic_graph::error::SearchError;
use helios_elastic_graph::{ConnectionPage, GraphError, ValidationError};
use serde_json::{Value, json};

async fn resolve(args: Value) -> (ConnectionPage, MemoryClient) {
    let client = seeded_client(&category_posts());
    let page = posts_connection().resolve(&client, &args).await.unwrap();
    (page, client)
}

fn ids(page: &ConnectionPage) -> Vec<&str> {
    page.window.nodes().map(|n| n.id.as_str()).collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_default_ordering_applies_without_ordering_argument() {
    let (page, client) = resolve(json!({})).await;
    assert_eq!(ids(&page), vec!["3", "1", "2"]);
    assert_eq!(
        client.last_search().unwrap()["sort"],
        json!([{ "num_views": { "order": "desc" } }])
    );
}

#[tokio::test]
async fn test_explicit_ordering_replaces_default() {
    let (page, client) = resolve(json!({ "ordering": { "title": "ASC" } })).await;
    assert_eq!(ids(&page), vec!["2", "1", "3"]);
    assert_eq!(
        client.last_search().unwrap()["sort"],
        json!([{ "title.raw": { "order": "asc" } }])
    );
}

#[tokio::test]
async fn test_ordering_keeps_request_order() {
    let (_, client) = resolve(json!({
        "ordering": { "published": "DESC", "title": "ASC" }
    }))
    .await;
    assert_eq!(
        client.last_search().unwrap()["sort"],
        json!([
            { "published": { "order": "desc" } },
            { "title.raw": { "order": "asc" } }
        ])
    );
}

#[tokio::test]
async fn test_unknown_ordering_field_rejected() {
    let client = seeded_client(&category_posts());
    let err = posts_connection()
        .resolve(&client, &json!({ "ordering": { "tags": "ASC" } }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::UnknownArgument { .. })
    ));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_all_fields() {
    let (page, client) = resolve(json!({ "search": { "query": "django" } })).await;
    assert_eq!(ids(&page), vec!["2"]);

    let must = &client.last_search().unwrap()["query"]["bool"]["must"];
    assert_eq!(must[0]["bool"]["minimum_should_match"], 1);
    assert_eq!(
        must[0]["bool"]["should"],
        json!([
            { "match": { "category": { "query": "django" } } },
            { "match": { "title": { "query": "django", "boost": 4.0 } } }
        ])
    );
}

#[tokio::test]
async fn test_search_single_field_with_request_boost() {
    let (page, client) = resolve(json!({
        "search": { "title": { "value": "elastic", "boost": 2 } }
    }))
    .await;
    assert_eq!(page.total, 2);
    assert_eq!(
        client.last_search().unwrap()["query"]["bool"]["must"][0]["bool"]["should"],
        json!([{ "match": { "title": { "query": "elastic", "boost": 2.0 } } }])
    );
}

#[tokio::test]
async fn test_search_combines_with_filters() {
    let (page, _) = resolve(json!({
        "search": { "title": "elastic" },
        "filter": { "num_views": { "lt": 200 } }
    }))
    .await;
    assert_eq!(ids(&page), vec!["1"]);
}

// ============================================================================
// Post Filter and Facets
// ============================================================================

#[tokio::test]
async fn test_post_filter_narrows_hits_not_facets() {
    let (page, client) = resolve(json!({
        "postFilter": { "category": "Django" },
        "facets": ["category"]
    }))
    .await;

    assert_eq!(ids(&page), vec!["2"]);
    assert_eq!(page.total, 1);

    let body = client.last_search().unwrap();
    assert_eq!(body["post_filter"], json!({ "term": { "category.raw": "Django" } }));
    assert_eq!(body["query"], json!({ "match_all": {} }));

    let facets = page.facets().unwrap();
    assert_eq!(
        facets["category"]["buckets"],
        json!([
            { "key": "Elastic", "doc_count": 2 },
            { "key": "Django", "doc_count": 1 }
        ])
    );
}

#[tokio::test]
async fn test_enabled_facet_always_present() {
    let (page, client) = resolve(json!({})).await;
    let body = client.last_search().unwrap();
    assert!(body["aggs"].get("_filter_tags").is_some());
    assert!(body["aggs"].get("_filter_category").is_none());

    let facets = page.facets().unwrap();
    assert_eq!(facets["tags"]["buckets"][0], json!({ "key": "elastic", "doc_count": 2 }));
}

#[tokio::test]
async fn test_unknown_facet_rejected() {
    let client = seeded_client(&category_posts());
    let err = posts_connection()
        .resolve(&client, &json!({ "facets": ["published"] }))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

// ============================================================================
// Output Fields
// ============================================================================

#[tokio::test]
async fn test_score_is_exposed_on_nodes() {
    let (page, _) = resolve(json!({ "first": 1 })).await;
    assert_eq!(page.window.edges[0].node.score, Some(1.0));
}

#[tokio::test]
async fn test_highlight_source_and_suggest_reach_the_body() {
    let (page, client) = resolve(json!({
        "highlight": ["title"],
        "source": ["title"],
        "suggest": { "title": "elastc" }
    }))
    .await;
    assert_eq!(page.window.len(), 3);

    let body = client.last_search().unwrap();
    assert!(body["highlight"]["fields"].get("title").is_some());
    assert_eq!(body["_source"], json!(["title"]));
    assert_eq!(
        body["suggest"]["title"],
        json!({ "text": "elastc", "term": { "field": "title" } })
    );
}

#[tokio::test]
async fn test_node_reads_nested_source() {
    let (page, _) = resolve(json!({ "filter": { "category": "Django" } })).await;
    let node = &page.window.edges[0].node;
    assert_eq!(node.get("category"), Some(&json!("Django")));
    assert_eq!(node.source["comments"][0]["author"], "ann");
}

// ============================================================================
// Identity Lookup
// ============================================================================

#[tokio::test]
async fn test_id_fetches_one_node() {
    let (page, client) = resolve(json!({ "id": "3" })).await;
    assert_eq!(ids(&page), vec!["3"]);
    assert_eq!(page.total, 1);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, Operation::Get);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_client_errors_pass_through() {
    let client = MemoryClient::unavailable();
    let err = posts_connection()
        .resolve(&client, &json!({ "first": 1 }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Search(SearchError::Unavailable { .. })
    ));
}

#[tokio::test]
async fn test_unknown_top_level_argument() {
    let client = seeded_client(&category_posts());
    let err = posts_connection()
        .resolve(&client, &json!({ "where": { "category": "Elastic" } }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::UnknownArgument { ref argument }) if argument == "where"
    ));
}
