//! Rule capability traits and the evaluation context.
//!
//! A [`Rule`] is one constraint: it evaluates a value, declares which other
//! rules it conflicts with, and can render itself for diagnostics. A
//! [`RuleSet`] is a rule that additionally coerces an untyped input into a
//! typed output. Rule-sets are built once, shared via `Arc`, and applied to
//! any number of inputs.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{join_path, ErrorCode, Violation, Violations};
use crate::value::Value;

// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

/// Evaluation context carried through every rule invocation.
///
/// Tracks the slash-delimited field path of the value under evaluation plus
/// the cancellation signal and optional deadline for the whole Apply call.
/// Cancellation is cooperative: rules and the engine check it at well-defined
/// points, started work always runs to completion.
#[derive(Debug, Clone)]
pub struct Context {
    path: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: empty path, fresh cancellation token, no deadline.
    pub fn new() -> Self {
        Context {
            path: String::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Attach an externally-owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The field path of the value currently under evaluation.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Child context for one field: same signal, extended path.
    pub fn at(&self, key: &str) -> Context {
        Context {
            path: join_path(&self.path, key),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_elapsed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True when the evaluation should stop dispatching new work.
    pub fn signalled(&self) -> bool {
        self.is_cancelled() || self.deadline_elapsed()
    }

    /// The single terminal violation appended after a signalled evaluation
    /// has drained its in-flight tasks. The deadline takes precedence over
    /// plain cancellation when both fired.
    pub fn terminal_violation(&self) -> Violation {
        if self.deadline_elapsed() {
            Violation::new(ErrorCode::Timeout, self.path.clone(), "evaluation deadline elapsed")
        } else {
            Violation::new(ErrorCode::Cancelled, self.path.clone(), "evaluation was cancelled")
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Rule
// ──────────────────────────────────────────────

/// One composable constraint.
///
/// Rules are immutable and shared (`Arc<dyn Rule>`); a rule-set is a chain
/// of them. `conflicts_with` drives the chain's structural conflict
/// resolution: when a new rule is linked, every existing node it conflicts
/// with is pruned first, so re-adding a constraint supersedes the old one.
pub trait Rule: Send + Sync {
    /// Check `value` and report every violation found.
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations;

    /// Stable rule name, used for diagnostics and as the default conflict
    /// key.
    fn name(&self) -> &'static str;

    /// Human-readable label for `describe` output.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Whether adding `other` to a chain should remove this rule.
    ///
    /// The default treats two rules with the same name as conflicting,
    /// which is right for single-instance constraints (`min`, `required`,
    /// ...). Rules that may coexist with same-named siblings override this.
    fn conflicts_with(&self, other: &dyn Rule) -> bool {
        self.name() == other.name()
    }

    /// Downcast support for rules the engine treats specially.
    fn as_any(&self) -> &dyn Any;
}

// ──────────────────────────────────────────────
// RuleSet
// ──────────────────────────────────────────────

/// A rule that coerces and validates one value type.
///
/// `apply` turns the untyped `input` into the rule-set's target type,
/// runs every chained constraint against the coerced value, and writes the
/// result through `out` only when no violation was found. Rule evaluation
/// itself is lock-free; the engine serializes writes to shared output.
#[async_trait]
pub trait RuleSet: Rule {
    async fn apply(&self, ctx: &Context, input: &Value, out: &mut Value) -> Violations;

    /// Whether the engine should report absence of this field as a
    /// [`ErrorCode::Required`] violation.
    fn required(&self) -> bool {
        false
    }
}

// ──────────────────────────────────────────────
// Condition
// ──────────────────────────────────────────────

/// Whole-record predicate gating a conditional field rule.
///
/// The predicate runs against a snapshot of the output only after every
/// field named in `depends_on` has fully settled; the engine guarantees it
/// never observes a dependency mid-flight.
#[derive(Clone)]
pub struct Condition {
    depends_on: Vec<String>,
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Condition {
    pub fn new<I, K, F>(depends_on: I, predicate: F) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Condition {
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            predicate: Arc::new(predicate),
        }
    }

    /// Constant field keys this condition must wait for.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Evaluate the predicate against an output snapshot.
    pub fn check(&self, snapshot: &Value) -> bool {
        (self.predicate)(snapshot)
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn context_paths_nest() {
        let root = Context::new();
        assert_eq!(root.path(), "");
        let child = root.at("address").at("city");
        assert_eq!(child.path(), "/address/city");
    }

    #[test]
    fn context_cancellation_is_shared_with_children() {
        let token = CancellationToken::new();
        let ctx = Context::new().with_cancellation(token.clone());
        let child = ctx.at("a");
        assert!(!child.signalled());
        token.cancel();
        assert!(child.signalled());
        assert_eq!(child.terminal_violation().code, ErrorCode::Cancelled);
    }

    #[test]
    fn elapsed_deadline_yields_timeout() {
        let ctx = Context::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(ctx.signalled());
        assert_eq!(ctx.terminal_violation().code, ErrorCode::Timeout);
    }

    #[test]
    fn condition_checks_snapshot() {
        let cond = Condition::new(["kind"], |snap: &Value| {
            snap.field("kind") == Some(&Value::Text("card".into()))
        });
        assert_eq!(cond.depends_on(), &["kind".to_string()]);

        let mut fields = std::collections::BTreeMap::new();
        fields.insert("kind".to_string(), Value::Text("card".into()));
        assert!(cond.check(&Value::Record(fields)));
        assert!(!cond.check(&Value::Record(Default::default())));
    }
}
