//! Numeric rule-sets and their leaf constraints.
//!
//! All ordering runs on `rust_decimal::Decimal`; integers are promoted so
//! `5` and `5.0` compare consistently. No `f64` anywhere.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::{ErrorCode, Violation, Violations};
use crate::rule::{Context, Rule, RuleSet};
use crate::rules::RequiredFlag;
use crate::value::Value;

// ──────────────────────────────────────────────
// Leaf constraints
// ──────────────────────────────────────────────

/// Inclusive numeric minimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinRule {
    pub min: Decimal,
}

impl Rule for MinRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value.as_decimal() {
            Some(d) if d < self.min => Violations::of(Violation::new(
                ErrorCode::Min,
                ctx.path(),
                format!("must be no less than {}", self.min),
            )),
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "min"
    }

    fn describe(&self) -> String {
        format!("min({})", self.min)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Inclusive numeric maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxRule {
    pub max: Decimal,
}

impl Rule for MaxRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value.as_decimal() {
            Some(d) if d > self.max => Violations::of(Violation::new(
                ErrorCode::Max,
                ctx.path(),
                format!("must be no greater than {}", self.max),
            )),
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "max"
    }

    fn describe(&self) -> String {
        format!("max({})", self.max)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ──────────────────────────────────────────────
// IntRules
// ──────────────────────────────────────────────

/// Rule-set coercing to [`Value::Int`] and checking numeric bounds.
#[derive(Debug, Clone, Default)]
pub struct IntRules {
    chain: Chain,
}

impl IntRules {
    pub fn new() -> Self {
        IntRules {
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
        IntRules {
            chain: self.chain.with(Arc::new(RequiredFlag)),
        }
    }

    pub fn with_min(self, min: i64) -> Self {
        IntRules {
            chain: self.chain.with(Arc::new(MinRule {
                min: Decimal::from(min),
            })),
        }
    }

    pub fn with_max(self, max: i64) -> Self {
        IntRules {
            chain: self.chain.with(Arc::new(MaxRule {
                max: Decimal::from(max),
            })),
        }
    }

    /// Coerce a compatible value into an integer: integers pass through,
    /// fraction-free decimals narrow, integral text parses.
    fn coerce(&self, ctx: &Context, input: &Value) -> Result<Value, Violation> {
        match input {
            Value::Int(_) => Ok(input.clone()),
            Value::Decimal(d) => match decimal_to_i64(*d) {
                Some(i) => Ok(Value::Int(i)),
                None => Err(type_violation(ctx, "Int", input)),
            },
            Value::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => Err(type_violation(ctx, "Int", input)),
            },
            other => Err(type_violation(ctx, "Int", other)),
        }
    }
}

impl Rule for IntRules {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        self.chain.evaluate(ctx, value)
    }

    fn name(&self) -> &'static str {
        "int"
    }

    fn describe(&self) -> String {
        format!("int({})", self.chain.describe())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl RuleSet for IntRules {
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
// DecimalRules
// ──────────────────────────────────────────────

/// Rule-set coercing to [`Value::Decimal`] and checking numeric bounds.
#[derive(Debug, Clone, Default)]
pub struct DecimalRules {
    chain: Chain,
}

impl DecimalRules {
    pub fn new() -> Self {
        DecimalRules {
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
        DecimalRules {
            chain: self.chain.with(Arc::new(RequiredFlag)),
        }
    }

    pub fn with_min(self, min: Decimal) -> Self {
        DecimalRules {
            chain: self.chain.with(Arc::new(MinRule { min })),
        }
    }

    pub fn with_max(self, max: Decimal) -> Self {
        DecimalRules {
            chain: self.chain.with(Arc::new(MaxRule { max })),
        }
    }

    fn coerce(&self, ctx: &Context, input: &Value) -> Result<Value, Violation> {
        match input {
            Value::Decimal(_) => Ok(input.clone()),
            Value::Int(i) => Ok(Value::Decimal(Decimal::from(*i))),
            Value::Text(s) => match s.trim().parse::<Decimal>() {
                Ok(d) => Ok(Value::Decimal(d)),
                Err(_) => Err(type_violation(ctx, "Decimal", input)),
            },
            other => Err(type_violation(ctx, "Decimal", other)),
        }
    }
}

impl Rule for DecimalRules {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        self.chain.evaluate(ctx, value)
    }

    fn name(&self) -> &'static str {
        "decimal"
    }

    fn describe(&self) -> String {
        format!("decimal({})", self.chain.describe())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl RuleSet for DecimalRules {
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
// Helpers
// ──────────────────────────────────────────────

fn decimal_to_i64(d: Decimal) -> Option<i64> {
    if d.fract() != Decimal::ZERO {
        return None;
    }
    use rust_decimal::prelude::ToPrimitive;
    d.to_i64()
}

fn type_violation(ctx: &Context, expected: &str, got: &Value) -> Violation {
    Violation::new(
        ErrorCode::Type,
        ctx.path(),
        format!("expected {}, got {}", expected, got.type_name()),
    )
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
