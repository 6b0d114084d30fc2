//! Structural JSON schemas for request and response bodies.
//!
//! Routes reference schemas by name (`recipe.RecipeCreate`, or
//! `recipe.RecipeOut[]` for a list). Names are resolved against a
//! [`SchemaRegistry`] when the contract is loaded, so a dangling reference
//! stops the process before it serves anything.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{ContractError, ContractResult};

/// A body failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// JSON path of the offending value (`$.ingredients[1]`).
    pub path: String,
    /// What was wrong.
    pub message: String,
}

impl ValidationError {
    fn at(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// A structural schema.
///
/// Schemas deserialize from the contract's `schemas` section using a `type`
/// tag:
///
/// ```yaml
/// recipe.RecipeCreate:
///   type: object
///   required: [title]
///   properties:
///     title: { type: string, min_length: 2, max_length: 200 }
///     servings: { type: integer, minimum: 1 }
/// ```
///
/// # Example
///
/// ```
/// use switchyard_core::Schema;
///
/// let schema = Schema::object()
///     .required_property("title", Schema::string().min_length(2))
///     .property("servings", Schema::integer().minimum(1));
///
/// assert!(schema.validate(&serde_json::json!({"title": "Soup"})).is_ok());
/// assert!(schema.validate(&serde_json::json!({"title": "S"})).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    /// A string, length counted in characters.
    String {
        /// Minimum length.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        /// Maximum length.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    /// An integer.
    Integer {
        /// Inclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        /// Inclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// Any JSON number.
    Number {
        /// Inclusive lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// `true` or `false`.
    Boolean,
    /// A list of values sharing one schema.
    Array {
        /// Item schema.
        items: Box<Schema>,
        /// Minimum item count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        /// Maximum item count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    /// An object with known properties. Unknown properties are accepted.
    Object {
        /// Property schemas.
        #[serde(default)]
        properties: IndexMap<String, Schema>,
        /// Properties that must be present and non-null.
        #[serde(default)]
        required: Vec<String>,
    },
    /// Accepts any value.
    Any,
}

impl Schema {
    /// Unbounded string.
    #[must_use]
    pub fn string() -> Self {
        Self::String {
            min_length: None,
            max_length: None,
        }
    }

    /// Unbounded integer.
    #[must_use]
    pub fn integer() -> Self {
        Self::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// Unbounded number.
    #[must_use]
    pub fn number() -> Self {
        Self::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// Boolean.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean
    }

    /// Accepts anything.
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// Array of `items`.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// Empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object {
            properties: IndexMap::new(),
            required: Vec::new(),
        }
    }

    /// Adds an optional property to an object schema.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let Self::Object { properties, .. } = &mut self {
            properties.insert(name.into(), schema);
        }
        self
    }

    /// Adds a required property to an object schema.
    #[must_use]
    pub fn required_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let Self::Object {
            properties,
            required,
        } = &mut self
        {
            let name = name.into();
            required.push(name.clone());
            properties.insert(name, schema);
        }
        self
    }

    /// Sets the minimum string length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let Self::String { min_length, .. } = &mut self {
            *min_length = Some(len);
        }
        self
    }

    /// Sets the maximum string length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let Self::String { max_length, .. } = &mut self {
            *max_length = Some(len);
        }
        self
    }

    /// Sets the integer lower bound.
    #[must_use]
    pub fn minimum(mut self, min: i64) -> Self {
        if let Self::Integer { minimum, .. } = &mut self {
            *minimum = Some(min);
        }
        self
    }

    /// Sets the integer upper bound.
    #[must_use]
    pub fn maximum(mut self, max: i64) -> Self {
        if let Self::Integer { maximum, .. } = &mut self {
            *maximum = Some(max);
        }
        self
    }

    /// Sets the minimum array length.
    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        if let Self::Array { min_items, .. } = &mut self {
            *min_items = Some(min);
        }
        self
    }

    /// Validates `value` against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        match self {
            Self::Any => Ok(()),

            Self::String {
                min_length,
                max_length,
            } => {
                let s = value.as_str().ok_or_else(|| mismatch(path, "string", value))?;
                let len = s.chars().count();
                if let Some(min) = min_length.filter(|min| len < *min) {
                    return Err(ValidationError::at(
                        path,
                        format!("string length {len} is less than minimum {min}"),
                    ));
                }
                if let Some(max) = max_length.filter(|max| len > *max) {
                    return Err(ValidationError::at(
                        path,
                        format!("string length {len} is greater than maximum {max}"),
                    ));
                }
                Ok(())
            }

            Self::Integer { minimum, maximum } => {
                let n = value.as_i64().ok_or_else(|| mismatch(path, "integer", value))?;
                if let Some(min) = minimum.filter(|min| n < *min) {
                    return Err(ValidationError::at(
                        path,
                        format!("value {n} is less than minimum {min}"),
                    ));
                }
                if let Some(max) = maximum.filter(|max| n > *max) {
                    return Err(ValidationError::at(
                        path,
                        format!("value {n} is greater than maximum {max}"),
                    ));
                }
                Ok(())
            }

            Self::Number { minimum, maximum } => {
                let n = value.as_f64().ok_or_else(|| mismatch(path, "number", value))?;
                if let Some(min) = minimum.filter(|min| n < *min) {
                    return Err(ValidationError::at(
                        path,
                        format!("value {n} is less than minimum {min}"),
                    ));
                }
                if let Some(max) = maximum.filter(|max| n > *max) {
                    return Err(ValidationError::at(
                        path,
                        format!("value {n} is greater than maximum {max}"),
                    ));
                }
                Ok(())
            }

            Self::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| mismatch(path, "boolean", value)),

            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let arr = value.as_array().ok_or_else(|| mismatch(path, "array", value))?;
                if let Some(min) = min_items.filter(|min| arr.len() < *min) {
                    return Err(ValidationError::at(
                        path,
                        format!("array length {} is less than minimum {min}", arr.len()),
                    ));
                }
                if let Some(max) = max_items.filter(|max| arr.len() > *max) {
                    return Err(ValidationError::at(
                        path,
                        format!("array length {} is greater than maximum {max}", arr.len()),
                    ));
                }
                for (idx, item) in arr.iter().enumerate() {
                    items.validate_at(item, &format!("{path}[{idx}]"))?;
                }
                Ok(())
            }

            Self::Object {
                properties,
                required,
            } => {
                let obj = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
                for name in required {
                    if obj.get(name).map_or(true, Value::is_null) {
                        return Err(ValidationError::at(
                            &format!("{path}.{name}"),
                            format!("missing required property '{name}'"),
                        ));
                    }
                }
                for (name, schema) in properties {
                    match obj.get(name) {
                        None | Some(Value::Null) => {}
                        Some(prop) => schema.validate_at(prop, &format!("{path}.{name}"))?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> ValidationError {
    ValidationError::at(
        path,
        format!("expected {expected}, got {}", value_type_name(value)),
    )
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A schema reference as written in the contract.
///
/// A trailing `[]` marks a list of the named schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    /// Referenced schema name.
    pub name: String,
    /// Whether the reference denotes a list.
    pub many: bool,
}

impl SchemaRef {
    /// Parses `name` or `name[]`.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        match reference.strip_suffix("[]") {
            Some(name) => Self {
                name: name.to_string(),
                many: true,
            },
            None => Self {
                name: reference.to_string(),
                many: false,
            },
        }
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.many {
            write!(f, "{}[]", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A resolved schema together with the reference it came from.
#[derive(Debug, Clone)]
pub struct BoundSchema {
    reference: SchemaRef,
    schema: Arc<Schema>,
}

impl BoundSchema {
    /// The contract reference.
    #[must_use]
    pub fn reference(&self) -> &SchemaRef {
        &self.reference
    }

    /// The resolved schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validates `value` against the resolved schema.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.schema.validate(value)
    }
}

/// Named schemas available to a process.
///
/// # Example
///
/// ```
/// use switchyard_core::{Schema, SchemaRef, SchemaRegistry};
///
/// let mut registry = SchemaRegistry::new();
/// registry.register("recipe.RecipeOut", Schema::object()).unwrap();
///
/// let list = registry.resolve(&SchemaRef::parse("recipe.RecipeOut[]")).unwrap();
/// assert!(list.validate(&serde_json::json!([{}, {}])).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` under `name`. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, schema: Schema) -> ContractResult<()> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(ContractError::DuplicateSchema(name));
        }
        self.schemas.insert(name, Arc::new(schema));
        Ok(())
    }

    /// Chained form of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, schema: Schema) -> ContractResult<Self> {
        self.register(name, schema)?;
        Ok(self)
    }

    /// Resolves a reference, wrapping list references in an array schema.
    #[must_use]
    pub fn resolve(&self, reference: &SchemaRef) -> Option<BoundSchema> {
        let schema = self.schemas.get(&reference.name)?;
        let schema = if reference.many {
            Arc::new(Schema::array(schema.as_ref().clone()))
        } else {
            Arc::clone(schema)
        };
        Some(BoundSchema {
            reference: reference.clone(),
            schema,
        })
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
