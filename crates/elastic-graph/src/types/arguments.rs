//! Static argument descriptors.
//!
//! Every backend describes the arguments it accepts once, when a connection
//! is built. The descriptors double as the introspection surface and as the
//! validator for incoming argument trees.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::field::ScalarType;
use crate::error::ValidationError;

/// Shape of one argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentKind {
    /// A typed scalar.
    Scalar { scalar: ScalarType },
    /// Any JSON value; the consuming backend interprets it.
    Any,
    /// A list of values. A single value is accepted as a one-element list.
    List { item: Box<ArgumentKind> },
    /// One of a fixed set of names.
    Enum { values: Vec<String> },
    /// An input object.
    Object { fields: Vec<ArgumentDescriptor> },
    /// A filter field: either a bare value (matched exactly) or an object
    /// keyed by lookup name.
    Lookups {
        scalar: ScalarType,
        lookups: Vec<ArgumentDescriptor>,
    },
}

impl ArgumentKind {
    /// Shorthand for a scalar kind.
    pub fn scalar(scalar: ScalarType) -> Self {
        ArgumentKind::Scalar { scalar }
    }

    /// Shorthand for a list kind.
    pub fn list(item: ArgumentKind) -> Self {
        ArgumentKind::List {
            item: Box::new(item),
        }
    }

    /// Shorthand for an enum kind.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgumentKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for an object kind.
    pub fn object(fields: Vec<ArgumentDescriptor>) -> Self {
        ArgumentKind::Object { fields }
    }
}

/// A named argument and its shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: ArgumentKind,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl ArgumentDescriptor {
    /// Creates an optional argument.
    pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    /// Marks the argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the child descriptors of an object argument.
    pub fn fields(&self) -> &[ArgumentDescriptor] {
        match &self.kind {
            ArgumentKind::Object { fields } => fields,
            ArgumentKind::Lookups { lookups, .. } => lookups,
            _ => &[],
        }
    }

    /// Validates `value` against this descriptor. `path` names the argument
    /// in error messages.
    pub fn validate(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        validate_kind(&self.kind, value, path)
    }
}

fn invalid(path: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidArgument {
        argument: path.to_string(),
        message: message.into(),
    }
}

fn validate_kind(kind: &ArgumentKind, value: &Value, path: &str) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }
    match kind {
        ArgumentKind::Any => Ok(()),
        ArgumentKind::Scalar { scalar } => validate_scalar(*scalar, value, path),
        ArgumentKind::List { item } => match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, v)| validate_kind(item, v, &format!("{path}[{i}]"))),
            single => validate_kind(item, single, path),
        },
        ArgumentKind::Enum { values } => match value.as_str() {
            Some(s) if values.iter().any(|v| v == s) => Ok(()),
            Some(s) => Err(invalid(path, format!("`{s}` is not one of {values:?}"))),
            None => Err(invalid(path, "expected an enum name")),
        },
        ArgumentKind::Lookups { scalar, lookups } => match value {
            Value::Object(_) => validate_kind(&ArgumentKind::object(lookups.clone()), value, path),
            Value::Array(_) => Err(invalid(path, "expected a value or a lookup object")),
            bare => validate_scalar(*scalar, bare, path),
        },
        ArgumentKind::Object { fields } => {
            let object = value
                .as_object()
                .ok_or_else(|| invalid(path, "expected an object"))?;
            for (key, child_value) in object {
                let child_path = format!("{path}.{key}");
                let descriptor = fields
                    .iter()
                    .find(|f| &f.name == key)
                    .ok_or(ValidationError::UnknownArgument {
                        argument: child_path.clone(),
                    })?;
                descriptor.validate(child_value, &child_path)?;
            }
            for field in fields.iter().filter(|f| f.required) {
                if object.get(&field.name).is_none_or(Value::is_null) {
                    return Err(invalid(
                        &format!("{path}.{}", field.name),
                        "required argument is missing",
                    ));
                }
            }
            Ok(())
        }
    }
}

fn validate_scalar(scalar: ScalarType, value: &Value, path: &str) -> Result<(), ValidationError> {
    let ok = match scalar {
        ScalarType::String | ScalarType::DateTime => value.is_string(),
        ScalarType::Int => value.is_i64() || value.is_u64(),
        ScalarType::Float => value.is_number(),
        ScalarType::Boolean => value.is_boolean(),
        ScalarType::JsonString => true,
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(path, format!("expected {scalar:?}")))
    }
}

/// The argument tree of one connection, cached by (backend prefix, field).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaArguments {
    arguments: Vec<ArgumentDescriptor>,
    #[serde(skip)]
    owners: Vec<String>,
    #[serde(skip)]
    by_field: BTreeMap<(String, String), ArgumentDescriptor>,
}

impl SchemaArguments {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a top-level argument owned by `owner`. Returns the owner of
    /// an existing argument with the same name instead of registering.
    pub fn insert(&mut self, owner: &str, descriptor: ArgumentDescriptor) -> Result<(), String> {
        if let Some(index) = self.arguments.iter().position(|a| a.name == descriptor.name) {
            return Err(self.owners[index].clone());
        }
        for field in descriptor.fields() {
            self.by_field.insert(
                (descriptor.name.clone(), field.name.clone()),
                field.clone(),
            );
        }
        self.arguments.push(descriptor);
        self.owners.push(owner.to_string());
        Ok(())
    }

    /// Returns every top-level argument.
    pub fn arguments(&self) -> &[ArgumentDescriptor] {
        &self.arguments
    }

    /// Looks up a top-level argument.
    pub fn get(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Looks up the descriptor of `field` inside the bucket `prefix`.
    pub fn field(&self, prefix: &str, field: &str) -> Option<&ArgumentDescriptor> {
        self.by_field.get(&(prefix.to_string(), field.to_string()))
    }

    /// Validates a full argument object.
    pub fn validate(&self, args: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
        for (name, value) in args {
            let descriptor = self.get(name).ok_or(ValidationError::UnknownArgument {
                argument: name.clone(),
            })?;
            descriptor.validate(value, name)?;
        }
        Ok(())
    }
}
