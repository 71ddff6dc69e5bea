//! Pre-decode step for textual and byte-string inputs.
//!
//! Object schemas reject scalar inputs with a type violation unless a
//! configured [`Decoder`] turns the scalar into a map-shaped value first.
//! The decode happens before shape checking and is the only place the
//! engine touches serialized data.

use sift_core::error::{ErrorCode, Violation};
use sift_core::value::Value;

/// Capability turning a scalar input into a map-shaped value.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &str, input: &Value) -> Result<Value, Violation>;
}

/// JSON decoder: parses `Text` or `Bytes` and requires the result to be an
/// object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        JsonDecoder
    }
}

impl Decoder for JsonDecoder {
    fn decode(&self, path: &str, input: &Value) -> Result<Value, Violation> {
        let parsed: serde_json::Value = match input {
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| type_violation(path, format!("invalid JSON: {}", e)))?,
            Value::Bytes(b) => serde_json::from_slice(b)
                .map_err(|e| type_violation(path, format!("invalid JSON: {}", e)))?,
            other => {
                return Err(type_violation(
                    path,
                    format!("cannot decode {} as JSON", other.type_name()),
                ))
            }
        };
        let value = Value::from_json(&parsed).map_err(|e| type_violation(path, e.to_string()))?;
        match value {
            Value::Record(_) => Ok(value),
            other => Err(type_violation(
                path,
                format!("decoded JSON is {}, expected an object", other.type_name()),
            )),
        }
    }
}

fn type_violation(path: &str, message: String) -> Violation {
    Violation::new(ErrorCode::Type, path, message)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
