//! Relevance score backend.

use serde_json::Value;

use super::FilterBackend;
use crate::error::ValidationError;
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, OutputField, QueryBuilder};

/// Exposes each hit's relevance score on its node. Takes no arguments and
/// never changes the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBackend;

impl FilterBackend for ScoreBackend {
    fn name(&self) -> &str {
        "score"
    }

    fn prefix(&self) -> &str {
        "score"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        Vec::new()
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        field_name == "score"
    }

    fn filter(
        &self,
        builder: QueryBuilder,
        _bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        Ok(builder)
    }

    fn output_fields(&self) -> &[OutputField] {
        &[OutputField::Score]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_never_mutates() {
        let mut builder = QueryBuilder::new("blog_post");
        builder.add_filter(serde_json::json!({ "term": { "a": 1 } }));
        assert_eq!(ScoreBackend.filter(builder.clone(), None).unwrap(), builder);
        assert_eq!(ScoreBackend.output_fields(), &[OutputField::Score]);
    }
}
