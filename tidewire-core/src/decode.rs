//! Response decoding.
//!
//! Decoding happens in two steps. [`parse_body`] turns raw bytes into a
//! [`serde_json::Value`]; a failure there is a JSON error. A caller-supplied
//! [`Decoder`] then turns the value into a domain type; a failure there is a
//! [`DecodeError`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Caller-supplied function from a JSON value to a domain value.
pub type Decoder<T> = dyn Fn(&Value) -> Result<T, DecodeError> + Send + Sync;

/// Parses a response body. An empty body is treated as `{}`.
pub fn parse_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body)
}

/// Decodes any `serde` type from a JSON value.
pub fn decode_json<T: DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(DecodeError::from)
}

/// Decodes the value stored under `key`.
pub fn decode_at<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T, DecodeError> {
    let inner = value
        .get(key)
        .ok_or_else(|| DecodeError::MissingKey(key.to_string()))?;
    decode_json(inner)
}

/// Decodes the value found by walking nested object keys.
pub fn decode_path<T: DeserializeOwned>(value: &Value, path: &[&str]) -> Result<T, DecodeError> {
    let mut current = value;
    for key in path {
        current = current
            .get(key)
            .ok_or_else(|| DecodeError::MissingKey(path.join(".")))?;
    }
    decode_json(current)
}

// ============================================================================
// Raw Value Enums
// ============================================================================

/// Enumerations backed by a string or integer wire value.
pub trait RawValueEnum: Sized {
    /// Parses a string-backed value.
    fn from_raw_str(raw: &str) -> Option<Self>;

    /// Parses an integer-backed value.
    fn from_raw_int(_raw: i64) -> Option<Self> {
        None
    }
}

/// Decodes a [`RawValueEnum`] from a JSON string or integer.
pub fn decode_raw_value<E: RawValueEnum>(value: &Value) -> Result<E, DecodeError> {
    match value {
        Value::String(raw) => E::from_raw_str(raw)
            .ok_or_else(|| DecodeError::Custom(format!("Invalid enum value: {raw}"))),
        Value::Number(number) => number
            .as_i64()
            .and_then(E::from_raw_int)
            .ok_or_else(|| DecodeError::Custom(format!("Invalid enum value: {number}"))),
        other => Err(DecodeError::TypeMismatch {
            expected: "string or integer".to_string(),
            actual: json_type_name(other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
