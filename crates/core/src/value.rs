//! Runtime value union for the validation engine.
//!
//! Inputs and coerced outputs are carried as [`Value`] everywhere inside the
//! engine; conversion to and from `serde_json::Value` happens only at the
//! boundary. All non-integer numerics use `rust_decimal::Decimal` -- never
//! `f64`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

// ──────────────────────────────────────────────
// Conversion errors
// ──────────────────────────────────────────────

/// Errors produced when converting a host JSON value into a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A JSON number that cannot be represented as `i64` or `Decimal`.
    NumberOutOfRange { raw: String },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::NumberOutOfRange { raw } => {
                write!(f, "number out of representable range: {}", raw)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

// ──────────────────────────────────────────────
// Value
// ──────────────────────────────────────────────

/// Tagged union of every value shape the engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "Text",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Record(_) => "Record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the record fields, if this value is a record.
    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Read one field of a record value.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_record().and_then(|fields| fields.get(key))
    }

    /// Numeric view of this value, promoting `Int` to `Decimal` so `5` and
    /// `5.0` compare consistently.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Convert a `serde_json::Value` into an engine value.
    ///
    /// Integers stay `Int`; every other JSON number becomes `Decimal`.
    /// JSON numbers outside both ranges (e.g. `1e300`) are rejected rather
    /// than silently rounded.
    pub fn from_json(v: &serde_json::Value) -> Result<Value, ConvertError> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Value::Int(i));
                }
                n.as_f64()
                    .and_then(Decimal::from_f64_retain)
                    .map(Value::Decimal)
                    .ok_or_else(|| ConvertError::NumberOutOfRange { raw: n.to_string() })
            }
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Value::from_json(item)?);
                }
                Ok(Value::List(out))
            }
            serde_json::Value::Object(fields) => {
                let mut out = BTreeMap::new();
                for (k, v) in fields {
                    out.insert(k.clone(), Value::from_json(v)?);
                }
                Ok(Value::Record(out))
            }
        }
    }

    /// Convert back to a `serde_json::Value`.
    ///
    /// Decimals that fit a JSON number are emitted as numbers; the rest are
    /// emitted as their canonical string form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
