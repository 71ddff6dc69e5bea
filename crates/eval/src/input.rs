//! Input accessor capability.
//!
//! The engine never touches a concrete host data structure: it asks an
//! [`Input`] whether the value is map-shaped or record-shaped, enumerates
//! keys, and reads values. Map-shaped inputs enumerate their keys; for
//! record-shaped hosts key enumeration is undefined and only constant-key
//! rules apply.

use sift_core::value::Value;

// ──────────────────────────────────────────────
// Shape
// ──────────────────────────────────────────────

/// The three input shapes the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Key/value map: keys enumerable, dynamic matchers apply.
    Map,
    /// Fixed-field record: values readable by constant key only.
    Record,
    /// Anything else; valid only when a decoder can turn it into a map.
    Scalar,
}

// ──────────────────────────────────────────────
// Input
// ──────────────────────────────────────────────

/// Read-only view over the value being validated.
pub trait Input: Send + Sync {
    fn shape(&self) -> Shape;

    /// All present keys. Meaningful for [`Shape::Map`] only; record-shaped
    /// inputs return an empty list.
    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<Value>;

    /// The underlying scalar, for [`Shape::Scalar`] inputs that a decoder
    /// may pre-decode. Map- and record-shaped inputs return `None`.
    fn raw(&self) -> Option<Value> {
        None
    }
}

/// A [`Value`] is its own input: records are map-shaped, everything else
/// is scalar.
impl Input for Value {
    fn shape(&self) -> Shape {
        match self {
            Value::Record(_) => Shape::Map,
            _ => Shape::Scalar,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self.as_record() {
            Some(fields) => fields.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.field(key).cloned()
    }

    fn raw(&self) -> Option<Value> {
        match self {
            Value::Record(_) => None,
            other => Some(other.clone()),
        }
    }
}

// ──────────────────────────────────────────────
// Record-shaped hosts
// ──────────────────────────────────────────────

/// Field-read capability a record-shaped host must supply.
pub trait RecordSource: Send + Sync {
    fn read(&self, key: &str) -> Option<Value>;
}

/// Adapter presenting a [`RecordSource`] as a record-shaped [`Input`].
pub struct RecordInput<S: RecordSource> {
    source: S,
}

impl<S: RecordSource> RecordInput<S> {
    pub fn new(source: S) -> Self {
        RecordInput { source }
    }
}

impl<S: RecordSource> Input for RecordInput<S> {
    fn shape(&self) -> Shape {
        Shape::Record
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.source.read(key)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
