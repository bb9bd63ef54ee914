//! Field lookup helpers shared by the normalizers.
//!
//! Every helper takes a list of synonymous keys and returns the first one that
//! is present and not `null`. None of them can fail: a value of the wrong type
//! is treated as absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier that upstreams send either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl Default for Identifier {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// First present, non-null value among `keys`.
pub(crate) fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| raw.get(*key)).find(|value| !value.is_null())
}

/// String value; numbers and booleans are rendered as text.
pub(crate) fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    field(raw, keys).and_then(value_to_text)
}

pub(crate) fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lower-cased string value, for keyword matching.
pub(crate) fn keyword(raw: &Value, keys: &[&str]) -> String {
    text(raw, keys).map(|s| s.trim().to_ascii_lowercase()).unwrap_or_default()
}

/// Numeric value; numeric strings are parsed.
pub(crate) fn number(raw: &Value, keys: &[&str]) -> Option<f64> {
    field(raw, keys).and_then(value_to_number)
}

pub(crate) fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Non-negative integer value. Fractions are floored; negatives are absent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn count(raw: &Value, keys: &[&str]) -> Option<u64> {
    number(raw, keys).filter(|n| *n >= 0.0).map(|n| n.floor() as u64)
}

/// Boolean value; `"true"`, `"1"` and non-zero numbers count as true.
pub(crate) fn flag(raw: &Value, keys: &[&str]) -> Option<bool> {
    field(raw, keys).map(|value| match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

/// Numeric-or-string identifier.
pub(crate) fn identifier(raw: &Value, keys: &[&str]) -> Option<Identifier> {
    field(raw, keys).and_then(|value| match value {
        Value::Number(n) => {
            n.as_u64().map(Identifier::Number).or_else(|| Some(Identifier::Text(n.to_string())))
        }
        Value::String(s) => Some(Identifier::Text(s.clone())),
        _ => None,
    })
}

/// The first of `keys` holding an array, or an empty slice.
pub(crate) fn array<'a>(raw: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// List items of a response that is either a bare array or an object
/// wrapping one under any of `keys`.
pub(crate) fn items<'a>(raw: &'a Value, keys: &[&str]) -> &'a [Value] {
    match raw {
        Value::Array(list) => list,
        _ => array(raw, keys),
    }
}

/// Array of identifiers rendered as strings. Non-scalar entries are skipped.
pub(crate) fn string_list(raw: &Value, keys: &[&str]) -> Vec<String> {
    array(raw, keys).iter().filter_map(value_to_text).collect()
}

/// Object value, for free-form pass-through maps.
pub(crate) fn object(raw: &Value, keys: &[&str]) -> Option<Map<String, Value>> {
    field(raw, keys).and_then(Value::as_object).cloned()
}

/// Pagination fields shared by every list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Page {
    pub cursor: Option<String>,
    pub has_more: bool,
    pub total: Option<u64>,
}

pub(crate) fn page(raw: &Value) -> Page {
    let cursor = text(raw, &["cursor", "next_cursor", "next"]);
    let has_more = flag(raw, &["has_more", "hasMore"]).unwrap_or(cursor.is_some());
    Page { cursor, has_more, total: count(raw, &["total"]) }
}

/// Rescales a percentage delivered on a 0 to 10000 basis.
///
/// Values above 100 cannot be a plain percentage, so they are divided by 100.
#[must_use]
pub fn rescale_percent(value: f64) -> f64 {
    if value > 100.0 {
        value / 100.0
    } else {
        value
    }
}
