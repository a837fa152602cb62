//! Nested filtering backend.
//!
//! Each configured entry names a nested document field; its sub-fields are
//! resolved below it so every compiled lookup is scoped to that document.

use std::collections::BTreeMap;

use serde_json::Value;

use super::FilterBackend;
use super::filtering::FieldFilter;
use crate::config::{ConnectionSettings, FieldOptions, validate_field_path};
use crate::error::{ConfigurationError, ValidationError};
use crate::lookup::build_field_specs;
use crate::registry::DocumentFields;
use crate::types::{ArgumentDescriptor, FieldSpec, FieldType, QueryBuilder};

/// Filters on sub-fields of nested documents.
#[derive(Debug, Clone)]
pub struct NestedFilteringBackend {
    fields: FieldFilter,
}

impl NestedFilteringBackend {
    /// Resolves `options` (nested field -> sub-field options) against
    /// `document`.
    pub fn new(
        options: &BTreeMap<String, BTreeMap<String, FieldOptions>>,
        document: &DocumentFields,
        settings: &ConnectionSettings,
    ) -> Result<Self, ConfigurationError> {
        let mut specs = Vec::with_capacity(options.len());
        for (name, sub_fields) in options {
            validate_field_path(name, name)?;
            let mut root = FieldSpec::new(name.clone(), name.clone());
            root.field_type = FieldType::Nested;
            root.children = build_field_specs(sub_fields, Some(document), Some(&root))?;
            if root.children.is_empty() {
                return Err(ConfigurationError::EmptyLookups {
                    field: name.clone(),
                });
            }
            specs.push(root);
        }
        Ok(Self {
            fields: FieldFilter::new(specs, settings),
        })
    }
}

impl FilterBackend for NestedFilteringBackend {
    fn name(&self) -> &str {
        "nested_filtering"
    }

    fn prefix(&self) -> &str {
        "nested"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MappingSchema;
    use serde_json::json;

    fn document() -> DocumentFields {
        let schema = MappingSchema::new([
            ("comments", "nested"),
            ("comments.author", "keyword"),
            ("comments.tag", "keyword"),
            ("reviews", "nested"),
            ("reviews.stars", "integer"),
        ]);
        DocumentFields::from_schema("posts", &schema)
    }

    fn backend() -> NestedFilteringBackend {
        let options = serde_json::from_str(
            r#"{
                "comments": {"author": {"lookups": ["term", "contains"]}, "tag": null},
                "reviews": {"stars": {"lookups": ["gte"]}}
            }"#,
        )
        .unwrap();
        NestedFilteringBackend::new(&options, &document(), &ConnectionSettings::default()).unwrap()
    }

    #[test]
    fn test_nested_contains_is_scoped_wildcard() {
        let bucket = json!({ "comments": { "author": { "contains": "eli" } } });
        let body = backend()
            .filter(QueryBuilder::new("blog_post"), Some(&bucket))
            .unwrap()
            .build()
            .body;

        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{
                "nested": {
                    "path": "comments",
                    "query": { "wildcard": { "comments.author": "*eli*" } }
                }
            }])
        );
    }

    #[test]
    fn test_sibling_nested_fields_stay_independent() {
        let bucket = json!({
            "comments": { "author": "eli", "tag": "rust" },
            "reviews": { "stars": { "gte": 4 } }
        });
        let body = backend()
            .filter(QueryBuilder::new("blog_post"), Some(&bucket))
            .unwrap()
            .build()
            .body;

        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        let paths: Vec<&str> = filters
            .iter()
            .map(|f| f["nested"]["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["comments", "comments", "reviews"]);
        assert_eq!(
            filters[2]["nested"]["query"],
            json!({ "range": { "reviews.stars": { "gte": 4 } } })
        );
    }

    #[test]
    fn test_descriptor_tree() {
        let descriptors = backend().contributed_fields(&document());
        let nested = &descriptors[0];
        assert_eq!(nested.name, "nested");
        let comments = nested.fields().iter().find(|f| f.name == "comments").unwrap();
        let author = comments.fields().iter().find(|f| f.name == "author").unwrap();
        let lookups: Vec<&str> = author.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(lookups, vec!["term", "contains", "value"]);
    }
}
