//! Boolean rule-set.

use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::{ErrorCode, Violation, Violations};
use crate::rule::{Context, Rule, RuleSet};
use crate::rules::RequiredFlag;
use crate::value::Value;

/// Rule-set coercing to [`Value::Bool`].
///
/// Accepts booleans, the texts `"true"`/`"false"`, and the integers `0`/`1`.
#[derive(Debug, Clone, Default)]
pub struct BoolRules {
    chain: Chain,
}

impl BoolRules {
    pub fn new() -> Self {
        BoolRules {
            chain: Chain::empty(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn with_required(self) -> Self {
        if self.chain.find::<RequiredFlag>().is_some() {
            return self;
        }
        BoolRules {
            chain: self.chain.with(Arc::new(RequiredFlag)),
        }
    }

    fn coerce(&self, ctx: &Context, input: &Value) -> Result<Value, Violation> {
        match input {
            Value::Bool(_) => Ok(input.clone()),
            Value::Text(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(type_violation(ctx, input)),
            },
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            other => Err(type_violation(ctx, other)),
        }
    }
}

fn type_violation(ctx: &Context, got: &Value) -> Violation {
    Violation::new(
        ErrorCode::Type,
        ctx.path(),
        format!("expected Bool, got {}", got.type_name()),
    )
}

impl Rule for BoolRules {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        self.chain.evaluate(ctx, value)
    }

    fn name(&self) -> &'static str {
        "bool"
    }

    fn describe(&self) -> String {
        format!("bool({})", self.chain.describe())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl RuleSet for BoolRules {
    async fn apply(&self, ctx: &Context, input: &Value, out: &mut Value) -> Violations {
        let coerced = match self.coerce(ctx, input) {
            Ok(v) => v,
            Err(violation) => return Violations::of(violation),
        };
        let violations = self.chain.evaluate(ctx, &coerced);
        if violations.is_empty() {
            *out = coerced;
        }
        violations
    }

    fn required(&self) -> bool {
        self.chain.find::<RequiredFlag>().is_some()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coercion_paths() {
        let rules = BoolRules::new();
        let ctx = Context::new();
        let mut out = Value::Null;

        assert!(rules
            .apply(&ctx, &Value::Bool(true), &mut out)
            .await
            .is_empty());
        assert_eq!(out, Value::Bool(true));

        assert!(rules
            .apply(&ctx, &Value::Text("false".into()), &mut out)
            .await
            .is_empty());
        assert_eq!(out, Value::Bool(false));

        assert!(rules.apply(&ctx, &Value::Int(1), &mut out).await.is_empty());
        assert_eq!(out, Value::Bool(true));

        let vs = rules.apply(&ctx, &Value::Int(2), &mut out).await;
        assert_eq!(vs.iter().next().unwrap().code, ErrorCode::Type);

        let vs = rules.apply(&ctx, &Value::Text("yes".into()), &mut out).await;
        assert_eq!(vs.iter().next().unwrap().code, ErrorCode::Type);
    }

    #[test]
    fn required_flag() {
        assert!(!BoolRules::new().required());
        assert!(BoolRules::new().with_required().required());
    }
}
