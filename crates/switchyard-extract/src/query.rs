//! Query parameter extraction.
//!
//! A [`QueryExtractor`] is built once per route from the route's declared
//! query parameters and applied to every request for that route. For each
//! declared name it reads the last occurrence in the query string, falls back
//! to the declared default, coerces to the declared type and checks the
//! inclusive bounds. Undeclared names are ignored.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use switchyard_core::{ParamType, QueryParamSpec, Route};

use crate::error::{ExtractionError, ExtractionSource};

/// Extraction function for one route.
///
/// # Example
///
/// ```rust
/// use indexmap::IndexMap;
/// use serde_json::json;
/// use switchyard_core::{ParamType, QueryParamSpec};
/// use switchyard_extract::QueryExtractor;
///
/// let mut specs = IndexMap::new();
/// specs.insert(
///     "limit".to_string(),
///     QueryParamSpec::new(ParamType::Integer)
///         .with_default(json!(100))
///         .with_bounds(Some(0.0), None),
/// );
/// let extractor = QueryExtractor::new(&specs);
///
/// let options = extractor.extract(Some("sort=title")).unwrap();
/// assert_eq!(options.get_i64("limit"), Some(100));
///
/// assert!(extractor.extract(Some("limit=-1")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryExtractor {
    specs: IndexMap<String, QueryParamSpec>,
}

impl QueryExtractor {
    /// Builds an extractor from declared parameters.
    #[must_use]
    pub fn new(specs: &IndexMap<String, QueryParamSpec>) -> Self {
        Self {
            specs: specs.clone(),
        }
    }

    /// Builds the extractor for a route.
    #[must_use]
    pub fn for_route(route: &Route) -> Self {
        Self::new(&route.query_params)
    }

    /// Whether the route declares no query parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Extracts the declared parameters from a raw query string.
    pub fn extract(&self, query: Option<&str>) -> Result<QueryOptions, ExtractionError> {
        let pairs: Vec<(String, String)> = match query.filter(|q| !q.is_empty()) {
            Some(q) => serde_urlencoded::from_str(q).map_err(|e| {
                ExtractionError::deserialization_failed(ExtractionSource::Query, e.to_string())
            })?,
            None => Vec::new(),
        };

        let mut values = IndexMap::with_capacity(self.specs.len());
        for (name, spec) in &self.specs {
            let raw = pairs
                .iter()
                .rev()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str());

            let value = match raw {
                Some(raw) => {
                    let value = coerce(name, spec.kind, raw)?;
                    check_bounds(name, spec, &value)?;
                    value
                }
                None => spec.default.clone().unwrap_or(Value::Null),
            };
            values.insert(name.clone(), value);
        }

        Ok(QueryOptions { values })
    }
}

fn coerce(name: &str, kind: ParamType, raw: &str) -> Result<Value, ExtractionError> {
    let invalid = || {
        ExtractionError::invalid_type(
            ExtractionSource::Query,
            name,
            format!("expected {}, got '{raw}'", kind.as_str()),
        )
    };

    match kind {
        ParamType::String => Ok(Value::String(raw.to_string())),
        ParamType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        ParamType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ParamType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
    }
}

fn check_bounds(name: &str, spec: &QueryParamSpec, value: &Value) -> Result<(), ExtractionError> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    if let Some(ge) = spec.ge.filter(|ge| n < *ge) {
        return Err(ExtractionError::validation_failed(
            ExtractionSource::Query,
            name,
            format!("must be greater than or equal to {ge}"),
        ));
    }
    if let Some(le) = spec.le.filter(|le| n > *le) {
        return Err(ExtractionError::validation_failed(
            ExtractionSource::Query,
            name,
            format!("must be less than or equal to {le}"),
        ));
    }
    Ok(())
}

/// Named options extracted from the query string, in declaration order.
///
/// Absent parameters without a default are present as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    values: IndexMap<String, Value>,
}

impl QueryOptions {
    /// No options.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw value of an option. `null` for declared-but-absent parameters.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Integer value of an option.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Numeric value of an option.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// String value of an option.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Boolean value of an option.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Names and values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no options.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The options as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
