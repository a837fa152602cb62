//! Blog post fixtures.
//!
//! Every integration test works on the same `blog_post` index: posts with a
//! keyword category, free-text title, tag list, view counter, publication
//! date and nested comments.

use helios_elastic_graph::{ConnectionConfig, ConnectionField, MappingSchema, SchemaRegistry};
use serde_json::{Value, json};

use super::memory::MemoryClient;

/// Index name used by every fixture connection.
pub const INDEX: &str = "blog_post";

/// Returns the `blog_post` index mapping.
pub fn posts_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "title": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "category": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "tags": { "type": "keyword" },
                "num_views": { "type": "long" },
                "published": { "type": "date" },
                "suggest_title": { "type": "completion" },
                "comments": {
                    "type": "nested",
                    "properties": {
                        "author": { "type": "keyword" },
                        "tag": { "type": "keyword" },
                        "stars": { "type": "integer" }
                    }
                }
            }
        }
    })
}

/// A post fixture.
#[derive(Debug, Clone)]
pub struct PostFixture {
    /// Document ID.
    pub id: String,
    /// Post title.
    pub title: String,
    /// Post category.
    pub category: String,
    /// Post tags.
    pub tags: Vec<String>,
    /// View counter.
    pub num_views: i64,
    /// Publication date (YYYY-MM-DD).
    pub published: String,
    /// Comments as (author, tag, stars).
    pub comments: Vec<(String, String, i64)>,
}

impl PostFixture {
    /// Creates a post with no tags and no comments.
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            tags: vec![],
            num_views: 0,
            published: "2019-01-01".to_string(),
            comments: vec![],
        }
    }

    /// Sets tags.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Sets the view counter.
    pub fn with_views(mut self, num_views: i64) -> Self {
        self.num_views = num_views;
        self
    }

    /// Sets the publication date.
    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = published.into();
        self
    }

    /// Adds a comment.
    pub fn with_comment(mut self, author: &str, tag: &str, stars: i64) -> Self {
        self.comments.push((author.to_string(), tag.to_string(), stars));
        self
    }

    /// Converts to an indexed source document.
    pub fn to_source(&self) -> Value {
        let comments: Vec<Value> = self
            .comments
            .iter()
            .map(|(author, tag, stars)| json!({ "author": author, "tag": tag, "stars": stars }))
            .collect();
        json!({
            "title": self.title,
            "category": self.category,
            "tags": self.tags,
            "num_views": self.num_views,
            "published": self.published,
            "comments": comments,
        })
    }
}

/// The three posts from the category examples: two in `Elastic`, one in
/// `Django`.
pub fn category_posts() -> Vec<PostFixture> {
    vec![
        PostFixture::new("1", "Elastic search basics", "Elastic")
            .with_tags(&["search", "elastic"])
            .with_views(120)
            .with_published("2019-01-10")
            .with_comment("eli", "rust", 5),
        PostFixture::new("2", "Django models", "Django")
            .with_tags(&["python"])
            .with_views(40)
            .with_published("2019-02-03")
            .with_comment("ann", "python", 3),
        PostFixture::new("3", "Scaling elastic clusters", "Elastic")
            .with_tags(&["ops", "elastic"])
            .with_views(300)
            .with_published("2019-03-22")
            .with_comment("elijah", "python", 4)
            .with_comment("bob", "rust", 1),
    ]
}

/// Five posts with increasing view counters, ids `p0`..`p4`.
pub fn numbered_posts() -> Vec<PostFixture> {
    (0..5)
        .map(|i| {
            PostFixture::new(format!("p{i}"), format!("Post number {i}"), "Elastic")
                .with_views(i * 10)
                .with_published(format!("2019-01-0{}", i + 1))
        })
        .collect()
}

/// Creates a registry holding the `posts` document.
pub fn posts_registry() -> SchemaRegistry {
    let schema = MappingSchema::from_mapping(&posts_mapping()).expect("fixture mapping is valid");
    SchemaRegistry::new().with_document("posts", &schema)
}

/// The full fixture connection definition.
pub fn posts_config() -> ConnectionConfig {
    serde_json::from_value(json!({
        "name": "allPostDocuments",
        "document": "posts",
        "index": INDEX,
        "backends": [
            "filtering",
            "post_filtering",
            "nested_filtering",
            "search",
            "ordering",
            "default_ordering",
            "highlight",
            "source",
            "score",
            "faceted_search",
            "suggest"
        ],
        "filter_fields": {
            "title": { "field": "title.raw", "lookups": ["term", "terms", "prefix", "contains", "wildcard"] },
            "category": "category.raw",
            "tags": { "lookups": ["term", "terms", "in", "exclude", "exists", "isnull"] },
            "num_views": { "lookups": ["term", "range", "gt", "gte", "lt", "lte"] },
            "published": { "lookups": ["gte", "lte", "range"], "default_lookup": "gte" }
        },
        "post_filter_fields": {
            "category": "category.raw"
        },
        "nested_filter_fields": {
            "comments": {
                "author": { "lookups": ["term", "contains"] },
                "tag": null,
                "stars": { "lookups": ["gte", "lte"] }
            }
        },
        "search_fields": {
            "title": { "boost": 4 },
            "category": null
        },
        "ordering_fields": {
            "title": "title.raw",
            "num_views": "num_views",
            "published": "published"
        },
        "ordering_defaults": ["-num_views"],
        "highlight_fields": {
            "title": null
        },
        "faceted_search_fields": {
            "category": "category.raw",
            "tags": { "field": "tags", "enabled": true }
        },
        "suggest_fields": {
            "title": { "field": "title", "suggesters": ["term", "phrase"] }
        },
        "settings": {
            "max_limit": 50
        }
    }))
    .expect("fixture connection definition is valid")
}

/// Builds the fixture connection.
pub fn posts_connection() -> ConnectionField {
    posts_config()
        .build(&posts_registry())
        .expect("fixture connection builds")
}

/// Creates a client seeded with `posts`.
pub fn seeded_client(posts: &[PostFixture]) -> MemoryClient {
    MemoryClient::new(posts.iter().map(|p| (p.id.clone(), p.to_source())))
}
