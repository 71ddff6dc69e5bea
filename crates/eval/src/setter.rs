//! Output accessor capability.
//!
//! A [`Setter`] abstracts writing a validated value into either a
//! map-shaped or record-shaped output, including named bucket sub-maps.
//! The engine holds every setter behind one exclusive lock: all writes and
//! all snapshot reads (condition evaluation, whole-record rules) go through
//! that lock, never a whole rule evaluation.

use std::collections::BTreeMap;
use std::fmt;

use sift_core::value::Value;

// ──────────────────────────────────────────────
// SetError
// ──────────────────────────────────────────────

/// Write failures. These indicate a defect in the output target wiring,
/// not in the input, and surface as `Internal` violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The record target has no field for this key.
    UnknownField { key: String },
    /// The value cannot be assigned to the target field.
    Unassignable { key: String, message: String },
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetError::UnknownField { key } => {
                write!(f, "output target has no field '{}'", key)
            }
            SetError::Unassignable { key, message } => {
                write!(f, "cannot assign field '{}': {}", key, message)
            }
        }
    }
}

impl std::error::Error for SetError {}

// ──────────────────────────────────────────────
// Setter
// ──────────────────────────────────────────────

/// Write-side view over the value being assembled.
pub trait Setter: Send + Sync {
    /// Write `value` under `key` in the primary output.
    fn set(&mut self, key: &str, value: Value) -> Result<(), SetError>;

    /// Write `value` under `key` inside the named bucket sub-map.
    fn set_in_bucket(&mut self, bucket: &str, key: &str, value: Value) -> Result<(), SetError>;

    /// Whether the primary output accepts arbitrary keys.
    fn is_map_shaped(&self) -> bool;

    /// Read back one primary field, for condition predicates.
    fn field(&self, key: &str) -> Option<Value>;

    /// Record view of everything written so far, buckets included as
    /// nested records. This is what conditions and whole-record rules see.
    fn snapshot(&self) -> Value;
}

// ──────────────────────────────────────────────
// MapSetter
// ──────────────────────────────────────────────

/// Map-shaped output target. Accepts any key; may be seeded from an
/// existing record, whose fields are then overwritten per successful rule.
#[derive(Debug, Clone, Default)]
pub struct MapSetter {
    fields: BTreeMap<String, Value>,
    buckets: BTreeMap<String, BTreeMap<String, Value>>,
}

impl MapSetter {
    pub fn new() -> Self {
        MapSetter::default()
    }

    pub fn seeded(fields: BTreeMap<String, Value>) -> Self {
        MapSetter {
            fields,
            buckets: BTreeMap::new(),
        }
    }

    pub fn bucket(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.buckets.get(name)
    }

    /// Consume into the final record value; buckets land as nested records
    /// under their names.
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        for (name, entries) in self.buckets {
            fields.insert(name, Value::Record(entries));
        }
        Value::Record(fields)
    }
}

impl Setter for MapSetter {
    fn set(&mut self, key: &str, value: Value) -> Result<(), SetError> {
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    fn set_in_bucket(&mut self, bucket: &str, key: &str, value: Value) -> Result<(), SetError> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn is_map_shaped(&self) -> bool {
        true
    }

    fn field(&self, key: &str) -> Option<Value> {
        self.fields.get(key).cloned()
    }

    fn snapshot(&self) -> Value {
        self.clone().into_value()
    }
}

// ──────────────────────────────────────────────
// RecordSetter
// ──────────────────────────────────────────────

/// Field-write capability a record-shaped target must supply.
///
/// `write` rejects unknown keys with [`SetError::UnknownField`]; that
/// surfaces as an `Internal` violation because a schema writing fields the
/// target lacks is a configuration defect.
pub trait RecordTarget: Send + Sync {
    fn write(&mut self, key: &str, value: Value) -> Result<(), SetError>;
    fn read(&self, key: &str) -> Option<Value>;
}

/// Record-shaped output target. Primary writes go to the host record;
/// bucket writes land in side maps, since fixed records carry no dynamic
/// keys. A written-field mirror backs the snapshot, as fixed records
/// cannot enumerate themselves.
pub struct RecordSetter<T: RecordTarget> {
    target: T,
    written: BTreeMap<String, Value>,
    buckets: BTreeMap<String, BTreeMap<String, Value>>,
}

impl<T: RecordTarget> RecordSetter<T> {
    pub fn new(target: T) -> Self {
        RecordSetter {
            target,
            written: BTreeMap::new(),
            buckets: BTreeMap::new(),
        }
    }

    pub fn bucket(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.buckets.get(name)
    }

    pub fn into_target(self) -> T {
        self.target
    }
}

impl<T: RecordTarget> Setter for RecordSetter<T> {
    fn set(&mut self, key: &str, value: Value) -> Result<(), SetError> {
        self.target.write(key, value.clone())?;
        self.written.insert(key.to_string(), value);
        Ok(())
    }

    fn set_in_bucket(&mut self, bucket: &str, key: &str, value: Value) -> Result<(), SetError> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn is_map_shaped(&self) -> bool {
        false
    }

    fn field(&self, key: &str) -> Option<Value> {
        self.target
            .read(key)
            .or_else(|| self.written.get(key).cloned())
    }

    fn snapshot(&self) -> Value {
        let mut fields = self.written.clone();
        for (name, entries) in &self.buckets {
            fields.insert(name.clone(), Value::Record(entries.clone()));
        }
        Value::Record(fields)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_setter_routes_fields_and_buckets() {
        let mut setter = MapSetter::new();
        setter.set("name", Value::Text("ada".into())).unwrap();
        setter
            .set_in_bucket("headers", "x-id", Value::Text("7".into()))
            .unwrap();

        assert!(setter.is_map_shaped());
        assert_eq!(setter.field("name"), Some(Value::Text("ada".into())));
        assert_eq!(
            setter.bucket("headers").and_then(|b| b.get("x-id")).cloned(),
            Some(Value::Text("7".into()))
        );

        let out = setter.into_value();
        assert_eq!(out.field("name"), Some(&Value::Text("ada".into())));
        assert_eq!(
            out.field("headers").and_then(|h| h.field("x-id")),
            Some(&Value::Text("7".into()))
        );
    }

    #[test]
    fn seeded_map_setter_keeps_existing_fields() {
        let mut seed = BTreeMap::new();
        seed.insert("kept".to_string(), Value::Int(1));
        seed.insert("replaced".to_string(), Value::Int(2));

        let mut setter = MapSetter::seeded(seed);
        setter.set("replaced", Value::Int(3)).unwrap();

        let out = setter.into_value();
        assert_eq!(out.field("kept"), Some(&Value::Int(1)));
        assert_eq!(out.field("replaced"), Some(&Value::Int(3)));
    }

    struct Account {
        name: Option<Value>,
        limit: Option<Value>,
    }

    impl RecordTarget for Account {
        fn write(&mut self, key: &str, value: Value) -> Result<(), SetError> {
            match key {
                "name" => self.name = Some(value),
                "limit" => self.limit = Some(value),
                other => {
                    return Err(SetError::UnknownField {
                        key: other.to_string(),
                    })
                }
            }
            Ok(())
        }

        fn read(&self, key: &str) -> Option<Value> {
            match key {
                "name" => self.name.clone(),
                "limit" => self.limit.clone(),
                _ => None,
            }
        }
    }

    #[test]
    fn record_setter_writes_through_target() {
        let mut setter = RecordSetter::new(Account {
            name: None,
            limit: None,
        });
        assert!(!setter.is_map_shaped());
        setter.set("name", Value::Text("ada".into())).unwrap();

        let err = setter.set("nope", Value::Null).unwrap_err();
        assert_eq!(
            err,
            SetError::UnknownField {
                key: "nope".to_string()
            }
        );

        let snap = setter.snapshot();
        assert_eq!(snap.field("name"), Some(&Value::Text("ada".into())));

        let account = setter.into_target();
        assert_eq!(account.name, Some(Value::Text("ada".into())));
        assert_eq!(account.limit, None);
    }
}
