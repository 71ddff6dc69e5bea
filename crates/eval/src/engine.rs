//! Concurrent object evaluation engine.
//!
//! An [`ObjectRules`] schema holds field rules, bucket declarations, and
//! whole-record rules in one constraint chain. Applying it to an input
//! fans out one task per (field rule x matching key) pair, serializes
//! same-field evaluations, lets conditional rules wait for their declared
//! dependencies to settle, routes dynamic keys into buckets, reports
//! unknown fields, and aggregates every violation. Individual field errors
//! never abort sibling evaluation; cancellation stops dispatch, drains
//! in-flight tasks, and appends exactly one terminal violation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use sift_core::chain::Chain;
use sift_core::error::{ErrorCode, SchemaError, Violation, Violations};
use sift_core::matcher::KeyMatcher;
use sift_core::refs::ReferenceGraph;
use sift_core::rule::{Condition, Context, Rule, RuleSet};
use sift_core::rules::RequiredFlag;
use sift_core::value::Value;

use crate::decode::Decoder;
use crate::gate::FieldGate;
use crate::input::{Input, Shape};
use crate::known::KnownFields;
use crate::setter::{MapSetter, Setter};

// ──────────────────────────────────────────────
// FieldRule
// ──────────────────────────────────────────────

/// One field rule: a key matcher, the value rule-set, an optional
/// whole-record condition, and an optional bucket the coerced value is
/// routed to. Field rules live in the object's constraint chain.
#[derive(Clone)]
pub struct FieldRule {
    matcher: KeyMatcher,
    rules: Arc<dyn RuleSet>,
    condition: Option<Condition>,
    bucket: Option<String>,
}

impl FieldRule {
    pub fn matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }
}

impl Rule for FieldRule {
    /// Field rules are dispatched by the engine, which owns presence
    /// checks and dependency ordering; evaluating one as a plain chain
    /// node finds nothing.
    fn evaluate(&self, _ctx: &Context, _value: &Value) -> Violations {
        Violations::new()
    }

    fn name(&self) -> &'static str {
        "field"
    }

    fn describe(&self) -> String {
        match &self.bucket {
            Some(bucket) => format!(
                "field({} -> {}: {})",
                self.matcher.label(),
                bucket,
                self.rules.describe()
            ),
            None => format!("field({}: {})", self.matcher.label(), self.rules.describe()),
        }
    }

    /// Re-declaring a rule for the same target supersedes the old one:
    /// two field rules conflict when they match the same key (equal
    /// constant key, or equal dynamic label) and route to the same bucket.
    fn conflicts_with(&self, other: &dyn Rule) -> bool {
        match other.as_any().downcast_ref::<FieldRule>() {
            Some(other) => {
                self.matcher.same_target(&other.matcher) && self.bucket == other.bucket
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ──────────────────────────────────────────────
// Bucket
// ──────────────────────────────────────────────

/// Named routing declaration: any key the matcher (and optional condition)
/// accepts lands in the bucket's sub-map. A key can land in zero, one, or
/// many buckets, and in the primary output only when no bucket claimed it.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    matcher: KeyMatcher,
    condition: Option<Condition>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, matcher: KeyMatcher) -> Self {
        Bucket {
            name: name.into(),
            matcher,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, key: &str, snapshot: &Value) -> bool {
        self.matcher.matches(key)
            && self.condition.as_ref().map_or(true, |c| c.check(snapshot))
    }
}

// ──────────────────────────────────────────────
// ObjectRules
// ──────────────────────────────────────────────

/// Object schema: one constraint chain of field rules, whole-record rules,
/// and the required flag, plus bucket declarations, the conditional-rule
/// dependency graph, the unknown-field policy, and an optional pre-decoder.
///
/// Immutable once built; one schema value serves any number of concurrent
/// `apply_to` calls.
#[derive(Clone, Default)]
pub struct ObjectRules {
    chain: Chain,
    buckets: Vec<Bucket>,
    refs: ReferenceGraph,
    allow_unknown: bool,
    decoder: Option<Arc<dyn Decoder>>,
}

impl ObjectRules {
    pub fn new() -> Self {
        ObjectRules::default()
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn references(&self) -> &ReferenceGraph {
        &self.refs
    }

    /// Rule for one constant key.
    pub fn with_field(self, key: impl Into<String>, rules: Arc<dyn RuleSet>) -> Self {
        self.link_field(KeyMatcher::exact(key), rules, None, None)
    }

    /// Rule for every key the matcher accepts. Dynamic matching applies to
    /// map-shaped inputs only.
    pub fn with_matched_field(self, matcher: KeyMatcher, rules: Arc<dyn RuleSet>) -> Self {
        self.link_field(matcher, rules, None, None)
    }

    /// Conditional rule for one constant key: the condition runs only after
    /// every key it depends on has settled, and the value rule applies only
    /// when the condition holds.
    pub fn with_conditional_field(
        self,
        key: impl Into<String>,
        rules: Arc<dyn RuleSet>,
        condition: Condition,
    ) -> Result<Self, SchemaError> {
        self.with_conditional_matched_field(KeyMatcher::exact(key), rules, condition)
    }

    /// Conditional rule for an arbitrary matcher. Fails with
    /// [`SchemaError::DynamicConditionKey`] for pattern and predicate
    /// matchers: only constant keys participate in dependency ordering.
    pub fn with_conditional_matched_field(
        mut self,
        matcher: KeyMatcher,
        rules: Arc<dyn RuleSet>,
        condition: Condition,
    ) -> Result<Self, SchemaError> {
        for dep in condition.depends_on() {
            self.refs.add(&matcher, dep)?;
        }
        Ok(self.link_field(matcher, rules, Some(condition), None))
    }

    /// Declare a routing-only bucket: matching unclaimed keys are copied in
    /// verbatim, without validation.
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.push(bucket);
        self
    }

    /// Declare a bucket together with a field rule validating the keys it
    /// claims.
    pub fn with_bucket_field(
        mut self,
        name: impl Into<String>,
        matcher: KeyMatcher,
        rules: Arc<dyn RuleSet>,
    ) -> Self {
        let name = name.into();
        self.buckets.push(Bucket::new(name.clone(), matcher.clone()));
        self.link_field(matcher, rules, None, Some(name))
    }

    /// Whole-record rule, evaluated against the assembled output snapshot
    /// after all field rules converge.
    pub fn with_record_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.chain = self.chain.with(rule);
        self
    }

    /// Mark the object itself required when nested inside another schema.
    pub fn with_required(mut self) -> Self {
        if self.chain.find::<RequiredFlag>().is_some() {
            return self;
        }
        self.chain = self.chain.with(Arc::new(RequiredFlag));
        self
    }

    /// Accept input keys no rule claims. Map-shaped outputs receive them
    /// verbatim; unknown-field tracking is skipped entirely.
    pub fn with_unknown_allowed(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    /// Pre-decode textual or byte-string inputs into map-shaped values.
    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    fn link_field(
        mut self,
        matcher: KeyMatcher,
        rules: Arc<dyn RuleSet>,
        condition: Option<Condition>,
        bucket: Option<String>,
    ) -> Self {
        self.chain = self.chain.with(Arc::new(FieldRule {
            matcher,
            rules,
            condition,
            bucket,
        }));
        self
    }

    /// Field rules in insertion order.
    fn field_rules(&self) -> Vec<FieldRule> {
        let mut rules: Vec<FieldRule> = self
            .chain
            .rules()
            .iter()
            .filter_map(|r| r.as_any().downcast_ref::<FieldRule>().cloned())
            .collect();
        rules.reverse();
        rules
    }

    /// Whole-record rules: every chain node that is neither a field rule
    /// nor the required flag.
    fn record_rules(&self) -> Vec<Arc<dyn Rule>> {
        let mut rules: Vec<Arc<dyn Rule>> = self
            .chain
            .rules()
            .into_iter()
            .filter(|r| {
                r.as_any().downcast_ref::<FieldRule>().is_none()
                    && r.as_any().downcast_ref::<RequiredFlag>().is_none()
            })
            .collect();
        rules.reverse();
        rules
    }

    /// Validate `input` and write the coerced output through `output`.
    ///
    /// The caller keeps the `Arc` and reads the assembled result out of it
    /// afterwards; a non-empty return means the output is not valid, though
    /// fields whose rules succeeded may already have been written (existing
    /// output values are reused and overwritten per successful rule).
    pub async fn apply_to<S>(
        &self,
        ctx: &Context,
        input: &dyn Input,
        output: Arc<Mutex<S>>,
    ) -> Violations
    where
        S: Setter + 'static,
    {
        // Step 1: shape normalization, decoding scalars when configured.
        let decoded: Value;
        let (input, map_shaped) = match input.shape() {
            Shape::Map => (input, true),
            Shape::Record => (input, false),
            Shape::Scalar => {
                let raw = input.raw();
                let decodable = matches!(&raw, Some(Value::Text(_)) | Some(Value::Bytes(_)));
                match (&self.decoder, raw) {
                    (Some(decoder), Some(raw)) if decodable => {
                        decoded = match decoder.decode(ctx.path(), &raw) {
                            Ok(value) => value,
                            Err(violation) => return Violations::of(violation),
                        };
                        (&decoded as &dyn Input, true)
                    }
                    (_, raw) => {
                        let got = raw.map_or("Null", |v| v.type_name());
                        return Violations::of(Violation::new(
                            ErrorCode::Type,
                            ctx.path(),
                            format!("expected a map- or record-shaped value, got {}", got),
                        ));
                    }
                }
            }
        };

        let field_rules = self.field_rules();
        let input_keys = input.keys();

        // Step 2: collect (field rule x matching key) pairs and arm one
        // completion gate per targeted key, all before any dispatch.
        // Constant keys arm even when absent; dynamic matchers arm per
        // present key and are undefined for record-shaped inputs.
        let mut pairs: Vec<(usize, String)> = Vec::new();
        for (i, rule) in field_rules.iter().enumerate() {
            match rule.matcher.constant_key() {
                Some(key) => pairs.push((i, key.to_string())),
                None if map_shaped => {
                    for key in &input_keys {
                        if rule.matcher.matches(key) {
                            pairs.push((i, key.clone()));
                        }
                    }
                }
                None => {}
            }
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, key) in &pairs {
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
        let gates: Arc<BTreeMap<String, Arc<FieldGate>>> = Arc::new(
            counts
                .into_iter()
                .map(|(key, n)| (key, Arc::new(FieldGate::armed(n))))
                .collect(),
        );

        let known = Arc::new(KnownFields::new(map_shaped && !self.allow_unknown));
        let buckets = Arc::new(self.buckets.clone());

        // Step 3: one task per pair. The dispatch loop checks the signal;
        // gates of pairs that never dispatch are settled so dependency
        // waits in already-running tasks cannot hang.
        let mut violations = Violations::new();
        let mut handles: Vec<JoinHandle<Violations>> = Vec::new();
        let mut dispatched = 0;
        for (i, key) in &pairs {
            if ctx.signalled() {
                break;
            }
            dispatched += 1;
            let task = FieldTask {
                rule: field_rules[*i].clone(),
                key: key.clone(),
                ctx: ctx.at(key),
                value: input.get(key),
                gates: gates.clone(),
                known: known.clone(),
                buckets: buckets.clone(),
                output: output.clone(),
            };
            handles.push(tokio::spawn(task.run()));
        }
        for (_, key) in &pairs[dispatched..] {
            if let Some(gate) = gates.get(key) {
                gate.complete();
            }
        }

        // Fan in: every started task runs to completion and is joined,
        // signal or not, preserving the mutex discipline on the output.
        for handle in handles {
            match handle.await {
                Ok(task_violations) => violations.merge(task_violations),
                Err(join_err) => violations.push(Violation::internal(
                    ctx.path(),
                    format!("field task failed: {}", join_err),
                )),
            }
        }

        if !ctx.signalled() {
            // Step 4: unclaimed keys are offered to the buckets; step 5:
            // what remains is unexpected (disallowed) or copied verbatim
            // into map-shaped outputs (allowed).
            if map_shaped {
                let task_unclaimed: Vec<String> = if known.is_active() {
                    known.unknown(&input_keys)
                } else {
                    input_keys
                        .iter()
                        .filter(|key| !field_rules.iter().any(|r| r.matcher.matches(key.as_str())))
                        .cloned()
                        .collect()
                };

                let mut leftover: Vec<String> = Vec::new();
                {
                    let mut out = output.lock().await;
                    for key in task_unclaimed {
                        let snapshot = out.snapshot();
                        let mut claimed = false;
                        for bucket in buckets.iter().filter(|b| b.accepts(&key, &snapshot)) {
                            if let Some(value) = input.get(&key) {
                                claimed = true;
                                if let Err(err) = out.set_in_bucket(&bucket.name, &key, value) {
                                    violations
                                        .push(Violation::internal(ctx.path(), err.to_string()));
                                }
                            }
                        }
                        if claimed {
                            known.add(&key);
                        } else {
                            leftover.push(key);
                        }
                    }

                    if !self.allow_unknown {
                        violations.merge(known.check(&input_keys, ctx.path()));
                    } else if out.is_map_shaped() {
                        for key in &leftover {
                            if let Some(value) = input.get(key) {
                                if let Err(err) = out.set(key, value) {
                                    violations
                                        .push(Violation::internal(ctx.path(), err.to_string()));
                                }
                            }
                        }
                    }
                }
            }

            // Step 6: whole-record rules run as their own tasks once the
            // field rules have converged. Each reads the snapshot under
            // the output lock and evaluates lock-free.
            let mut record_handles: Vec<JoinHandle<Violations>> = Vec::new();
            for rule in self.record_rules() {
                if ctx.signalled() {
                    break;
                }
                let ctx = ctx.clone();
                let output = output.clone();
                record_handles.push(tokio::spawn(async move {
                    if ctx.signalled() {
                        return Violations::new();
                    }
                    let snapshot = { output.lock().await.snapshot() };
                    rule.evaluate(&ctx, &snapshot)
                }));
            }
            for handle in record_handles {
                match handle.await {
                    Ok(rule_violations) => violations.merge(rule_violations),
                    Err(join_err) => violations.push(Violation::internal(
                        ctx.path(),
                        format!("record rule task failed: {}", join_err),
                    )),
                }
            }
        }

        // Exactly one terminal violation when the signal fired, after all
        // in-flight work has drained.
        if ctx.signalled() {
            violations.push(ctx.terminal_violation());
        }
        violations
    }
}

impl std::fmt::Debug for ObjectRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectRules[{}]", self.chain.describe())
    }
}

impl Rule for ObjectRules {
    /// As a plain rule, an object schema contributes its whole-record
    /// checks; coercion and field dispatch happen through `apply`.
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        let mut violations = Violations::new();
        for rule in self.record_rules() {
            violations.merge(rule.evaluate(ctx, value));
        }
        violations
    }

    fn name(&self) -> &'static str {
        "object"
    }

    fn describe(&self) -> String {
        format!("object({})", self.chain.describe())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl RuleSet for ObjectRules {
    /// Nested-object application: assembles into a map-shaped value,
    /// seeding from an existing record in `out` so untouched fields
    /// survive, and overwrites `out` only when no violation was found.
    async fn apply(&self, ctx: &Context, input: &Value, out: &mut Value) -> Violations {
        let seed = out.as_record().cloned().unwrap_or_default();
        let output = Arc::new(Mutex::new(MapSetter::seeded(seed)));
        let violations = self.apply_to(ctx, input, output.clone()).await;
        if violations.is_empty() {
            // Every task has been joined, so the Arc is ours again; fall
            // back to a locked snapshot if anything still holds it.
            let assembled = match Arc::try_unwrap(output) {
                Ok(lock) => lock.into_inner().into_value(),
                Err(shared) => shared.lock().await.snapshot(),
            };
            *out = assembled;
        }
        violations
    }

    fn required(&self) -> bool {
        self.chain.find::<RequiredFlag>().is_some()
    }
}

// ──────────────────────────────────────────────
// FieldTask
// ──────────────────────────────────────────────

/// One dispatched (field rule, key) evaluation.
///
/// Pending -> cancellation check -> dependency wait (conditional only) ->
/// condition -> {skipped, applying} -> done. The field's gate is
/// decremented on every exit path.
struct FieldTask<S: Setter> {
    rule: FieldRule,
    key: String,
    /// Child context rooted at this field's path.
    ctx: Context,
    value: Option<Value>,
    gates: Arc<BTreeMap<String, Arc<FieldGate>>>,
    known: Arc<KnownFields>,
    buckets: Arc<Vec<Bucket>>,
    output: Arc<Mutex<S>>,
}

impl<S: Setter + 'static> FieldTask<S> {
    async fn run(self) -> Violations {
        let gate = self.gates.get(&self.key).cloned();
        let violations = self.evaluate().await;
        if let Some(gate) = gate {
            gate.complete();
        }
        violations
    }

    async fn evaluate(&self) -> Violations {
        if self.ctx.signalled() {
            return Violations::new();
        }

        if let Some(condition) = &self.rule.condition {
            for dep in condition.depends_on() {
                if dep == &self.key {
                    continue;
                }
                if let Some(gate) = self.gates.get(dep) {
                    gate.wait_settled().await;
                }
            }
            let snapshot = { self.output.lock().await.snapshot() };
            if !condition.check(&snapshot) {
                // A failed condition skips the value rule but still claims
                // the key: the field is not unexpected, just not applicable.
                self.known.add(&self.key);
                return Violations::new();
            }
        }

        let value = match &self.value {
            Some(value) => value,
            None => {
                if self.rule.rules.required() {
                    return Violations::of(Violation::required(self.ctx.path()));
                }
                return Violations::new();
            }
        };

        self.known.add(&self.key);

        // Serialize with sibling rules on the same field, then evaluate
        // lock-free into a scratch value; only routing touches the output
        // lock.
        let _slot = match self.gates.get(&self.key) {
            Some(gate) => Some(gate.acquire_slot().await),
            None => None,
        };
        let mut scratch = Value::Null;
        let rule_violations = self.rule.rules.apply(&self.ctx, value, &mut scratch).await;
        if !rule_violations.is_empty() {
            return rule_violations;
        }

        let mut violations = Violations::new();
        let mut out = self.output.lock().await;
        let snapshot = out.snapshot();
        let mut routed = false;
        for bucket in self.buckets.iter().filter(|b| b.accepts(&self.key, &snapshot)) {
            routed = true;
            if let Err(err) = out.set_in_bucket(&bucket.name, &self.key, scratch.clone()) {
                violations.push(Violation::internal(self.ctx.path(), err.to_string()));
            }
        }
        if !routed {
            if let Err(err) = out.set(&self.key, scratch) {
                violations.push(Violation::internal(self.ctx.path(), err.to_string()));
            }
        }
        violations
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::rules::{IntRules, StringRules};

    fn apply_map(
        schema: &ObjectRules,
        input: Value,
    ) -> (Value, Violations) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let ctx = Context::new();
            let output = Arc::new(Mutex::new(MapSetter::new()));
            let violations = schema.apply_to(&ctx, &input, output.clone()).await;
            let assembled = output.lock().await.snapshot();
            (assembled, violations)
        })
    }

    fn record(entries: &[(&str, Value)]) -> Value {
        Value::Record(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn coerces_and_collects_field_violations() {
        let schema = ObjectRules::new()
            .with_field("name", Arc::new(StringRules::new().with_min_length(2)))
            .with_field("age", Arc::new(IntRules::new().with_min(0)));

        let (out, violations) = apply_map(
            &schema,
            record(&[("name", Value::Text("ada".into())), ("age", Value::Text("36".into()))]),
        );
        assert!(violations.is_empty(), "unexpected: {}", violations);
        assert_eq!(out.field("name"), Some(&Value::Text("ada".into())));
        assert_eq!(out.field("age"), Some(&Value::Int(36)));
    }

    #[test]
    fn independent_field_errors_are_all_collected() {
        let schema = ObjectRules::new()
            .with_field("name", Arc::new(StringRules::new().with_min_length(5)))
            .with_field("age", Arc::new(IntRules::new().with_min(18)));

        let (_, violations) = apply_map(
            &schema,
            record(&[("name", Value::Text("ab".into())), ("age", Value::Int(3))]),
        );
        assert_eq!(violations.len(), 2);
        let mut paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["/age", "/name"]);
    }

    #[test]
    fn scalar_input_without_decoder_is_a_type_violation() {
        let schema = ObjectRules::new();
        let (_, violations) = apply_map(&schema, Value::Int(7));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().code, ErrorCode::Type);
    }

    #[test]
    fn redeclaring_a_field_supersedes_the_old_rule() {
        let schema = ObjectRules::new()
            .with_field("v", Arc::new(IntRules::new().with_min(10)))
            .with_field("v", Arc::new(IntRules::new().with_min(0)));

        // Only the replacement rule runs: 5 satisfies min(0).
        let (out, violations) = apply_map(&schema, record(&[("v", Value::Int(5))]));
        assert!(violations.is_empty(), "unexpected: {}", violations);
        assert_eq!(out.field("v"), Some(&Value::Int(5)));
        assert!(!schema.describe().contains("min(10)"));
    }

    #[test]
    fn conditional_on_dynamic_key_fails_schema_construction() {
        let err = ObjectRules::new()
            .with_conditional_matched_field(
                KeyMatcher::predicate("upper", |k: &str| k.chars().all(char::is_uppercase)),
                Arc::new(StringRules::new()),
                Condition::new(["mode"], |_| true),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::DynamicConditionKey { .. }));
    }

    #[test]
    fn conditional_cycle_fails_schema_construction() {
        let err = ObjectRules::new()
            .with_conditional_field(
                "a",
                Arc::new(StringRules::new()),
                Condition::new(["b"], |_| true),
            )
            .and_then(|schema| {
                schema.with_conditional_field(
                    "b",
                    Arc::new(StringRules::new()),
                    Condition::new(["a"], |_| true),
                )
            })
            .unwrap_err();
        assert!(matches!(err, SchemaError::DependencyCycle { .. }));
    }
}
