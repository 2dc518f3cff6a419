//! Forgiving decoders for API fields whose JSON type drifts between calls.
//!
//! The API sends the same field as `"25"` in one reply and `25` in the next.
//! Scalars are read as text; containers are still rejected.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn scalar_text<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(E::custom(format!("expected a scalar, got {other}"))),
    }
}

/// Read a string, number or bool as text; `null` becomes the empty string.
pub(crate) fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_text(Value::deserialize(deserializer)?).map(Option::unwrap_or_default)
}

/// As [`string_or_scalar`], keeping `null` as `None`.
pub(crate) fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_text(Value::deserialize(deserializer)?)
}

/// Read a bool, or the strings `"true"`/`"false"`.
pub(crate) fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(D::Error::custom(format!("expected a bool, got {other}"))),
    }
}
