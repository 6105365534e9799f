//! Untyped payload objects and tolerant coercions.
//!
//! Mixin inputs and chain data arrive as serialized JSON objects. Reads never
//! fail on shape mismatch: a missing or wrong-typed key coerces to the zero
//! value of the requested type.

use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value};

/// A decoded key/value payload.
pub type Payload = Map<String, Value>;

/// Decodes serialized payload text into an object.
///
/// Empty text and `null` decode to an empty object. Any other non-object
/// value is rejected.
pub fn decode_object(text: &str) -> serde_json::Result<Payload> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Payload::new());
    }
    match serde_json::from_str::<Value>(trimmed)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Payload::new()),
        other => Err(serde_json::Error::custom(format!(
            "expected a JSON object, found {}",
            type_name(&other)
        ))),
    }
}

/// Encodes a payload object back into text.
pub fn encode_object(payload: &Payload) -> serde_json::Result<String> {
    serde_json::to_string(payload)
}

/// Returns the string value, or `""` if absent or not a string.
pub fn coerce_str(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).unwrap_or_default()
}

/// Returns the integer value, or `0` if absent or not numeric.
///
/// Fractional numbers are truncated toward zero; values beyond the `i64`
/// range saturate.
pub fn coerce_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        _ => 0,
    }
}

/// Returns the boolean value, or `false` if absent or not a boolean.
pub fn coerce_bool(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or_default()
}

/// Deserializes a value into `T`, returning `None` on any mismatch.
pub fn coerce_as<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| T::deserialize(v).ok())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
