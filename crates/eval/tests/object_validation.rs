//! End-to-end object validation scenarios: required fields, bucket
//! routing, unknown-field handling, conditional rules, nesting, record
//! targets, and the JSON pre-decode step.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::Mutex;

use sift_core::{
    Condition, Context, ErrorCode, IntRules, KeyMatcher, StringRules, Value,
};
use sift_eval::{
    validate, Bucket, JsonDecoder, ObjectRules, RecordSetter, RecordTarget, SetError,
};

fn int_rules() -> Arc<IntRules> {
    Arc::new(IntRules::new())
}

// ── Required & precise paths ────────────────────────────────────────────────

#[tokio::test]
async fn missing_required_field_yields_exactly_one_violation() {
    let schema = ObjectRules::new()
        .with_field("A", Arc::new(IntRules::new().with_min(2)))
        .with_field("B", Arc::new(IntRules::new().with_required()));

    let violations = validate(&schema, &serde_json::json!({"A": 5}))
        .await
        .unwrap_err();
    assert_eq!(violations.len(), 1);
    let v = violations.iter().next().unwrap();
    assert_eq!(v.code, ErrorCode::Required);
    assert_eq!(v.path, "/B");
}

#[tokio::test]
async fn absence_and_value_violations_are_both_reported() {
    let schema = ObjectRules::new()
        .with_field("A", Arc::new(IntRules::new().with_min(2)))
        .with_field("B", Arc::new(IntRules::new().with_required()));

    let violations = validate(&schema, &serde_json::json!({"A": 1}))
        .await
        .unwrap_err();
    assert_eq!(violations.len(), 2);
    let mut found: Vec<(ErrorCode, &str)> = violations
        .iter()
        .map(|v| (v.code, v.path.as_str()))
        .collect();
    found.sort_by_key(|(_, path)| path.to_string());
    assert_eq!(found, vec![(ErrorCode::Min, "/A"), (ErrorCode::Required, "/B")]);
}

// ── Buckets ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn key_matching_two_buckets_lands_in_both() {
    let schema = ObjectRules::new()
        .with_field("name", Arc::new(StringRules::new()))
        .with_bucket(Bucket::new(
            "headers",
            KeyMatcher::pattern(Regex::new("^x-").unwrap()),
        ))
        .with_bucket(Bucket::new(
            "ids",
            KeyMatcher::pattern(Regex::new("-id$").unwrap()),
        ));

    let out = validate(
        &schema,
        &serde_json::json!({"name": "ada", "x-trace-id": "abc"}),
    )
    .await
    .unwrap();

    assert_eq!(
        out,
        serde_json::json!({
            "name": "ada",
            "headers": {"x-trace-id": "abc"},
            "ids": {"x-trace-id": "abc"},
        })
    );
}

#[tokio::test]
async fn key_matching_no_bucket_is_unexpected_when_unknown_disallowed() {
    let schema = ObjectRules::new().with_bucket(Bucket::new(
        "headers",
        KeyMatcher::pattern(Regex::new("^x-").unwrap()),
    ));

    let violations = validate(&schema, &serde_json::json!({"rogue": 1}))
        .await
        .unwrap_err();
    assert_eq!(violations.len(), 1);
    let v = violations.iter().next().unwrap();
    assert_eq!(v.code, ErrorCode::Unexpected);
    assert_eq!(v.path, "/rogue");
}

#[tokio::test]
async fn bucket_field_rule_validates_what_it_routes() {
    let schema = ObjectRules::new().with_bucket_field(
        "limits",
        KeyMatcher::pattern(Regex::new("^limit_").unwrap()),
        Arc::new(IntRules::new().with_min(0)),
    );

    let out = validate(&schema, &serde_json::json!({"limit_daily": "100"}))
        .await
        .unwrap();
    assert_eq!(out, serde_json::json!({"limits": {"limit_daily": 100}}));

    let violations = validate(&schema, &serde_json::json!({"limit_daily": -1}))
        .await
        .unwrap_err();
    assert_eq!(violations.iter().next().unwrap().code, ErrorCode::Min);
    assert_eq!(violations.iter().next().unwrap().path, "/limit_daily");
}

// ── Unknown fields ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_fields_copied_verbatim_when_allowed() {
    let schema = ObjectRules::new()
        .with_field("name", Arc::new(StringRules::new()))
        .with_unknown_allowed();

    let out = validate(
        &schema,
        &serde_json::json!({"name": "ada", "extra": [1, 2]}),
    )
    .await
    .unwrap();
    assert_eq!(out, serde_json::json!({"name": "ada", "extra": [1, 2]}));
}

// ── Conditional rules ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_condition_skips_the_rule_but_claims_the_key() {
    let schema = ObjectRules::new()
        .with_field("kind", Arc::new(StringRules::new().with_required()))
        .with_conditional_field(
            "discount",
            Arc::new(IntRules::new().with_min(0)),
            Condition::new(["kind"], |snap: &Value| {
                snap.field("kind") == Some(&Value::Text("member".into()))
            }),
        )
        .unwrap();

    // Condition fails: the discount rule does not run (its value would
    // violate min(0)), and the key is not reported as unexpected.
    let out = validate(
        &schema,
        &serde_json::json!({"kind": "guest", "discount": -5}),
    )
    .await
    .unwrap();
    assert_eq!(out, serde_json::json!({"kind": "guest"}));

    // Condition holds: the rule applies and the violation surfaces.
    let violations = validate(
        &schema,
        &serde_json::json!({"kind": "member", "discount": -5}),
    )
    .await
    .unwrap_err();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations.iter().next().unwrap().code, ErrorCode::Min);
    assert_eq!(violations.iter().next().unwrap().path, "/discount");
}

// ── Nesting ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn nested_object_violations_carry_full_paths() {
    let address = ObjectRules::new()
        .with_field("city", Arc::new(StringRules::new().with_required()));
    let schema = ObjectRules::new().with_field("address", Arc::new(address));

    let violations = validate(&schema, &serde_json::json!({"address": {}}))
        .await
        .unwrap_err();
    assert_eq!(violations.len(), 1);
    let v = violations.iter().next().unwrap();
    assert_eq!(v.code, ErrorCode::Required);
    assert_eq!(v.path, "/address/city");
}

#[tokio::test]
async fn nested_object_coerces_into_the_output() {
    let address = ObjectRules::new()
        .with_field("city", Arc::new(StringRules::new()))
        .with_field("zip", Arc::new(IntRules::new()));
    let schema = ObjectRules::new().with_field("address", Arc::new(address));

    let out = validate(
        &schema,
        &serde_json::json!({"address": {"city": "berlin", "zip": "10117"}}),
    )
    .await
    .unwrap();
    assert_eq!(
        out,
        serde_json::json!({"address": {"city": "berlin", "zip": 10117}})
    );
}

// ── Pre-decode ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn textual_input_is_decoded_before_shape_checking() {
    let schema = ObjectRules::new()
        .with_field("n", Arc::new(IntRules::new().with_min(1)))
        .with_decoder(Arc::new(JsonDecoder::new()));

    let out = validate(&schema, &serde_json::json!(r#"{"n": 3}"#))
        .await
        .unwrap();
    assert_eq!(out, serde_json::json!({"n": 3}));
}

#[tokio::test]
async fn scalar_input_without_decoder_is_rejected() {
    let schema = ObjectRules::new();
    let violations = validate(&schema, &serde_json::json!(42)).await.unwrap_err();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations.iter().next().unwrap().code, ErrorCode::Type);
}

// ── Record-shaped output targets ────────────────────────────────────────────

#[derive(Debug, Default)]
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

#[tokio::test]
async fn record_target_receives_coerced_fields() {
    let schema = ObjectRules::new()
        .with_field("name", Arc::new(StringRules::new().with_required()))
        .with_field("limit", Arc::new(IntRules::new().with_min(0)));

    let input = Value::from_json(&serde_json::json!({"name": "ada", "limit": "100"})).unwrap();
    let output = Arc::new(Mutex::new(RecordSetter::new(Account::default())));
    let violations = schema
        .apply_to(&Context::new(), &input, output.clone())
        .await;
    assert!(violations.is_empty(), "unexpected: {}", violations);

    let setter = Arc::try_unwrap(output).ok().unwrap().into_inner();
    let account = setter.into_target();
    assert_eq!(account.name, Some(Value::Text("ada".into())));
    assert_eq!(account.limit, Some(Value::Int(100)));
}

#[tokio::test]
async fn schema_writing_a_missing_target_field_is_internal() {
    let schema = ObjectRules::new().with_field("nope", int_rules());

    let input = Value::from_json(&serde_json::json!({"nope": 1})).unwrap();
    let output = Arc::new(Mutex::new(RecordSetter::new(Account::default())));
    let violations = schema
        .apply_to(&Context::new(), &input, output.clone())
        .await;
    assert_eq!(violations.len(), 1);
    let v = violations.iter().next().unwrap();
    assert_eq!(v.code, ErrorCode::Internal);
    assert_eq!(v.path, "/nope");
}

// ── Output reuse ────────────────────────────────────────────────────────────

#[tokio::test]
async fn existing_output_fields_survive_and_successful_rules_overwrite() {
    use sift_core::RuleSet;

    let schema = ObjectRules::new()
        .with_field("replaced", int_rules())
        .with_unknown_allowed();

    // Applying onto a pre-populated record reuses it: untouched fields
    // survive, fields with successful rules are overwritten.
    let mut out = Value::from_json(&serde_json::json!({"kept": 1, "replaced": 2})).unwrap();
    let input = Value::from_json(&serde_json::json!({"replaced": 3})).unwrap();
    let violations = schema.apply(&Context::new(), &input, &mut out).await;
    assert!(violations.is_empty(), "unexpected: {}", violations);
    assert_eq!(out.field("kept"), Some(&Value::Int(1)));
    assert_eq!(out.field("replaced"), Some(&Value::Int(3)));
}
