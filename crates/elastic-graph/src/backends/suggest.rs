//! Suggest backend.
//!
//! Request form, per configured field:
//!
//! ```text
//! suggest: { title: { term: "elastc" } }
//! suggest: { title_suggest: { completion: "ela", context: { category: ["Elastic"] } } }
//! suggest: { title: "elastc" }            # default suggester
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::FilterBackend;
use crate::config::validate_field_path;
use crate::error::{ConfigurationError, ValidationError};
use crate::lookup::DEFAULT_LOOKUP_KEY;
use crate::registry::DocumentFields;
use crate::types::{
    ArgumentDescriptor, ArgumentKind, ConnectionExtras, QueryBuilder, ScalarType, SearchResponse,
};

const CONTEXT_KEY: &str = "context";

/// Engine suggester kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggesterKind {
    Term,
    Phrase,
    Completion,
}

impl SuggesterKind {
    /// Returns the engine name of this suggester.
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggesterKind::Term => "term",
            SuggesterKind::Phrase => "phrase",
            SuggesterKind::Completion => "completion",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        [
            SuggesterKind::Term,
            SuggesterKind::Phrase,
            SuggesterKind::Completion,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == raw)
    }
}

/// Configuration of one suggest field. A bare string is the engine path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestOptions {
    Path(String),
    Detailed(SuggestDefinition),
}

/// Detailed suggest field configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestDefinition {
    #[serde(default)]
    pub field: Option<String>,
    /// Allowed suggesters; `term` and `phrase` when absent.
    #[serde(default)]
    pub suggesters: Option<Vec<SuggesterKind>>,
    /// Suggester used for bare values; the first allowed one when absent.
    #[serde(default)]
    pub default_suggester: Option<SuggesterKind>,
    #[serde(default)]
    pub options: SuggesterSettings,
    #[serde(default)]
    pub completion_options: Option<CompletionOptions>,
}

/// Common suggester options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggesterSettings {
    #[serde(default)]
    pub size: Option<u32>,
    /// Completion only.
    #[serde(default)]
    pub skip_duplicates: Option<bool>,
}

/// Completion suggester options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Request context argument -> engine category context name.
    #[serde(default)]
    pub category_filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct SuggestField {
    name: String,
    path: String,
    suggesters: Vec<SuggesterKind>,
    default_suggester: SuggesterKind,
    settings: SuggesterSettings,
    category_filters: BTreeMap<String, String>,
}

impl SuggestField {
    fn resolve(name: &str, options: &SuggestOptions) -> Result<Self, ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::InvalidSuggestOption {
            field: name.to_string(),
            message: message.to_string(),
        };
        let definition = match options {
            SuggestOptions::Path(path) => SuggestDefinition {
                field: Some(path.clone()),
                ..Default::default()
            },
            SuggestOptions::Detailed(definition) => definition.clone(),
        };

        let path = definition.field.unwrap_or_else(|| name.to_string());
        validate_field_path(name, &path)?;

        let suggesters = definition
            .suggesters
            .unwrap_or_else(|| vec![SuggesterKind::Term, SuggesterKind::Phrase]);
        let default_suggester = match (definition.default_suggester, suggesters.first()) {
            (Some(kind), _) if suggesters.contains(&kind) => kind,
            (Some(_), _) => return Err(invalid("default_suggester must be one of suggesters")),
            (None, Some(first)) => *first,
            (None, None) => return Err(invalid("at least one suggester is required")),
        };

        let category_filters = definition
            .completion_options
            .map(|c| c.category_filters)
            .unwrap_or_default();
        if !category_filters.is_empty() && !suggesters.contains(&SuggesterKind::Completion) {
            return Err(invalid("category_filters require the completion suggester"));
        }

        Ok(Self {
            name: name.to_string(),
            path,
            suggesters,
            default_suggester,
            settings: definition.options,
            category_filters,
        })
    }

    fn descriptor(&self) -> ArgumentDescriptor {
        let text = || ArgumentKind::scalar(ScalarType::String);
        let mut fields: Vec<ArgumentDescriptor> = self
            .suggesters
            .iter()
            .map(|kind| ArgumentDescriptor::new(kind.as_str(), text()))
            .collect();
        fields.push(ArgumentDescriptor::new(DEFAULT_LOOKUP_KEY, text()));
        if !self.category_filters.is_empty() {
            let contexts = self
                .category_filters
                .keys()
                .map(|arg| ArgumentDescriptor::new(arg, ArgumentKind::list(text())))
                .collect();
            fields.push(ArgumentDescriptor::new(
                CONTEXT_KEY,
                ArgumentKind::object(contexts),
            ));
        }
        ArgumentDescriptor::new(
            &self.name,
            ArgumentKind::Lookups {
                scalar: ScalarType::String,
                lookups: fields,
            },
        )
    }

    fn invalid(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::InvalidArgument {
            argument: format!("suggest.{}", self.name),
            message: message.into(),
        }
    }

    /// Engine `contexts` for a completion suggester.
    fn contexts(&self, context: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        let Some(context) = context.and_then(Value::as_object) else {
            return Ok(None);
        };
        let mut contexts = Map::new();
        for (arg, values) in context {
            let Some(engine_context) = self.category_filters.get(arg) else {
                return Err(self.invalid(format!("unknown context `{arg}`")));
            };
            let values = match values {
                Value::Array(items) => items.clone(),
                Value::Null => continue,
                single => vec![single.clone()],
            };
            contexts.insert(engine_context.clone(), json!(values));
        }
        Ok((!contexts.is_empty()).then_some(Value::Object(contexts)))
    }

    fn suggester(&self, kind: SuggesterKind, text: &str, contexts: Option<&Value>) -> Value {
        let mut params = Map::new();
        params.insert("field".to_string(), json!(self.path));
        if let Some(size) = self.settings.size {
            params.insert("size".to_string(), json!(size));
        }
        match kind {
            SuggesterKind::Completion => {
                if let Some(skip) = self.settings.skip_duplicates {
                    params.insert("skip_duplicates".to_string(), json!(skip));
                }
                if let Some(contexts) = contexts {
                    params.insert("contexts".to_string(), contexts.clone());
                }
                json!({ "prefix": text, "completion": params })
            }
            SuggesterKind::Term | SuggesterKind::Phrase => {
                json!({ "text": text, kind.as_str(): params })
            }
        }
    }

    /// Resolves one request entry into (suggester name, body) pairs.
    fn requests(&self, value: &Value) -> Result<Vec<(String, Value)>, ValidationError> {
        let mut kinds: Vec<(SuggesterKind, String)> = Vec::new();
        let mut contexts = None;

        match value {
            Value::String(text) => kinds.push((self.default_suggester, text.clone())),
            Value::Object(map) => {
                for (key, text) in map.iter().filter(|(_, v)| !v.is_null()) {
                    if key == CONTEXT_KEY {
                        contexts = self.contexts(Some(text))?;
                        continue;
                    }
                    let kind = if key == DEFAULT_LOOKUP_KEY {
                        self.default_suggester
                    } else {
                        SuggesterKind::parse(key)
                            .filter(|kind| self.suggesters.contains(kind))
                            .ok_or_else(|| self.invalid(format!("unknown suggester `{key}`")))?
                    };
                    if kinds.iter().any(|(seen, _)| *seen == kind) {
                        return Err(self.invalid(format!(
                            "suggester `{}` requested more than once",
                            kind.as_str()
                        )));
                    }
                    let text = text
                        .as_str()
                        .ok_or_else(|| self.invalid("expected suggest text"))?;
                    kinds.push((kind, text.to_string()));
                }
            }
            _ => return Err(self.invalid("expected suggest text or suggester object")),
        }

        let qualified = kinds.len() > 1;
        Ok(kinds
            .into_iter()
            .map(|(kind, text)| {
                let name = if qualified {
                    format!("{}_{}", self.name, kind.as_str())
                } else {
                    self.name.clone()
                };
                (name, self.suggester(kind, &text, contexts.as_ref()))
            })
            .collect())
    }
}

/// Requests term, phrase and completion suggestions.
#[derive(Debug, Clone)]
pub struct SuggestBackend {
    fields: Vec<SuggestField>,
}

impl SuggestBackend {
    /// Validates the configured suggest fields.
    pub fn new(fields: &BTreeMap<String, SuggestOptions>) -> Result<Self, ConfigurationError> {
        let fields = fields
            .iter()
            .map(|(name, options)| SuggestField::resolve(name, options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }
}

impl FilterBackend for SuggestBackend {
    fn name(&self) -> &str {
        "suggest"
    }

    fn prefix(&self) -> &str {
        "suggest"
    }

    fn contributed_fields(&self, _document: &DocumentFields) -> Vec<ArgumentDescriptor> {
        if self.fields.is_empty() {
            return Vec::new();
        }
        vec![ArgumentDescriptor::new(
            self.prefix(),
            ArgumentKind::object(self.fields.iter().map(SuggestField::descriptor).collect()),
        )]
    }

    fn belongs_to(&self, field_name: &str) -> bool {
        self.fields.iter().any(|f| f.name == field_name)
    }

    fn filter(
        &self,
        mut builder: QueryBuilder,
        bucket: Option<&Value>,
    ) -> Result<QueryBuilder, ValidationError> {
        let Some(bucket) = bucket.and_then(Value::as_object) else {
            return Ok(builder);
        };

        for (name, value) in bucket.iter().filter(|(_, v)| !v.is_null()) {
            let Some(field) = self.fields.iter().find(|f| &f.name == name) else {
                tracing::debug!(field = %name, "Ignoring unknown suggest field");
                continue;
            };
            for (suggester_name, body) in field.requests(value)? {
                builder.add_suggester(suggester_name, body);
            }
        }
        Ok(builder)
    }

    fn alter_connection(&self, response: &SearchResponse, extras: &mut ConnectionExtras) {
        if let Some(suggest) = &response.suggest {
            extras.insert("suggestions".to_string(), suggest.clone());
        }
    }
}
