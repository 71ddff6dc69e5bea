//! Sift object validation engine -- applies an object schema to an untyped
//! input, fanning out one task per (field rule, key) pair, and produces a
//! coerced output or the full set of violations with field paths.
//!
//! Schemas are built with `sift-core`; this crate supplies the input and
//! output accessors, the per-field completion gates, the pre-decode step,
//! and the concurrent engine itself.

pub mod decode;
pub mod engine;
pub mod gate;
pub mod input;
pub mod known;
pub mod setter;

pub use decode::{Decoder, JsonDecoder};
pub use engine::{Bucket, FieldRule, ObjectRules};
pub use gate::FieldGate;
pub use input::{Input, RecordInput, RecordSource, Shape};
pub use known::KnownFields;
pub use setter::{MapSetter, RecordSetter, RecordTarget, SetError, Setter};

use std::sync::Arc;
use tokio::sync::Mutex;

use sift_core::error::{ErrorCode, Violation, Violations};
use sift_core::rule::Context;
use sift_core::value::Value;

/// Validate a JSON value against an object schema.
///
/// Top-level convenience over [`ObjectRules::apply_to`]: converts the
/// input at the boundary, assembles into a fresh map-shaped output, and
/// returns either the fully populated JSON value or every violation found.
pub async fn validate(
    schema: &ObjectRules,
    input: &serde_json::Value,
) -> Result<serde_json::Value, Violations> {
    validate_with(schema, &Context::new(), input).await
}

/// [`validate`] with a caller-supplied context, for cancellation and
/// deadline control.
pub async fn validate_with(
    schema: &ObjectRules,
    ctx: &Context,
    input: &serde_json::Value,
) -> Result<serde_json::Value, Violations> {
    let value = Value::from_json(input).map_err(|e| {
        Violations::of(Violation::new(ErrorCode::Type, ctx.path(), e.to_string()))
    })?;

    let output = Arc::new(Mutex::new(MapSetter::new()));
    let violations = schema.apply_to(ctx, &value, output.clone()).await;
    violations.into_result()?;

    // apply_to joins every task before returning, so the Arc is normally
    // ours again here.
    let assembled = match Arc::try_unwrap(output) {
        Ok(lock) => lock.into_inner().into_value(),
        Err(shared) => shared.lock().await.snapshot(),
    };
    Ok(assembled.to_json())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::rules::{IntRules, StringRules};

    #[tokio::test]
    async fn validate_returns_populated_output() {
        let schema = ObjectRules::new()
            .with_field("name", Arc::new(StringRules::new().with_required()))
            .with_field("age", Arc::new(IntRules::new().with_min(0)));

        let out = validate(&schema, &serde_json::json!({"name": "ada", "age": "36"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"name": "ada", "age": 36}));
    }

    #[tokio::test]
    async fn validate_returns_violations() {
        let schema = ObjectRules::new()
            .with_field("name", Arc::new(StringRules::new().with_required()));

        let violations = validate(&schema, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        let v = violations.iter().next().unwrap();
        assert_eq!(v.code, ErrorCode::Required);
        assert_eq!(v.path, "/name");
    }

    #[tokio::test]
    async fn validate_rejects_unrepresentable_numbers() {
        let schema = ObjectRules::new().with_unknown_allowed();
        let violations = validate(&schema, &serde_json::json!({"n": 1e300}))
            .await
            .unwrap_err();
        assert_eq!(violations.iter().next().unwrap().code, ErrorCode::Type);
    }
}
