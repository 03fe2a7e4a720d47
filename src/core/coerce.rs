//! Lenient field deserializers for stored policy documents.
//!
//! A document written by hand or by an older panel may carry `"85"` where an
//! integer belongs, or a numeric `chat_id`. Such values are coerced instead
//! of discarding the whole document. Values that cannot be coerced become a
//! value `validate` rejects (`0` for integers) or the type's empty value.
//! `null` is treated as absent.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::policy::TelegramOverlay;

/// Integers, integral floats and numeric strings become `i64`; anything
/// else becomes 0.
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(|v| value_to_int(&v)))
}

/// Strings pass through, numbers and booleans are rendered as text, anything
/// else becomes empty.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.map(|v| match v {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }),
    )
}

/// Booleans pass through; numbers are true when non-zero; strings are true
/// unless empty, `"0"` or `"false"`.
pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.map(|v| match v {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
            _ => false,
        }),
    )
}

/// A nested channel object; a non-object value is ignored.
pub fn channel<'de, D>(deserializer: D) -> Result<Option<TelegramOverlay>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => TelegramOverlay::deserialize(value)
            .map(Some)
            .map_err(D::Error::custom),
        _ => Ok(None),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_float(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

fn value_to_int(value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_float))
        }
        _ => None,
    };
    parsed.unwrap_or(0)
}
