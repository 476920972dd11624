//! Outcome Detail
//!
//! Widgets report outcomes as loose JSON. Only primitive values survive the
//! session boundary: strings, numbers and booleans. Everything else (objects,
//! arrays, null) is dropped without error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A primitive detail value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer or float, as received.
    Number(Number),
    /// Free text.
    Text(String),
}

impl DetailValue {
    /// Convert a JSON value, rejecting non-primitives.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Text content, if this is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Number, if this is numeric.
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for DetailValue {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for DetailValue {
    /// Non-finite floats have no JSON form and collapse to 0.
    fn from(value: f64) -> Self {
        Self::Number(Number::from_f64(value).unwrap_or_else(|| 0.into()))
    }
}

/// Sanitized outcome detail: string keys to primitive values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Detail(BTreeMap<String, DetailValue>);

impl Detail {
    /// Empty detail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the primitive members of a JSON object.
    ///
    /// Anything that is not an object sanitizes to an empty detail.
    pub fn sanitize(raw: &Value) -> Self {
        let Value::Object(map) = raw else {
            return Self::new();
        };
        Self(
            map.iter()
                .filter_map(|(key, value)| {
                    DetailValue::from_json(value).map(|v| (key.clone(), v))
                })
                .collect(),
        )
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DetailValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.0.get(key)
    }

    /// Look up a string value.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DetailValue::as_text)
    }

    /// Look up a numeric value.
    pub fn number(&self, key: &str) -> Option<&Number> {
        self.get(key).and_then(DetailValue::as_number)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the detail is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DetailValue)> {
        self.0.iter()
    }
}

/// Render a number the way the browser client stringifies it.
///
/// Integral values print without a fractional part (`3`, not `3.0`).
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => format!("{f}"),
        None => n.to_string(),
    }
}
