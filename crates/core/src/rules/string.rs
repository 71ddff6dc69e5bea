//! String rule-set and its leaf constraints.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::{ErrorCode, Violation, Violations};
use crate::rule::{Context, Rule, RuleSet};
use crate::rules::RequiredFlag;
use crate::value::Value;

// ──────────────────────────────────────────────
// Leaf constraints
// ──────────────────────────────────────────────

/// Minimum text length, in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinLengthRule {
    pub min: usize,
}

impl Rule for MinLengthRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value {
            Value::Text(s) if s.chars().count() < self.min => {
                Violations::of(Violation::new(
                    ErrorCode::MinLength,
                    ctx.path(),
                    format!("must be at least {} characters long", self.min),
                ))
            }
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "min_length"
    }

    fn describe(&self) -> String {
        format!("min_length({})", self.min)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Maximum text length, in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxLengthRule {
    pub max: usize,
}

impl Rule for MaxLengthRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value {
            Value::Text(s) if s.chars().count() > self.max => {
                Violations::of(Violation::new(
                    ErrorCode::MaxLength,
                    ctx.path(),
                    format!("must be at most {} characters long", self.max),
                ))
            }
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "max_length"
    }

    fn describe(&self) -> String {
        format!("max_length({})", self.max)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Regex pattern the full text must match.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub regex: Regex,
}

impl Rule for PatternRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value {
            Value::Text(s) if !self.regex.is_match(s) => Violations::of(Violation::new(
                ErrorCode::Pattern,
                ctx.path(),
                format!("must match pattern {}", self.regex.as_str()),
            )),
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "pattern"
    }

    fn describe(&self) -> String {
        format!("pattern({})", self.regex.as_str())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Closed set of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOfRule {
    pub values: Vec<String>,
}

impl Rule for OneOfRule {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        match value {
            Value::Text(s) if !self.values.iter().any(|v| v == s) => {
                Violations::of(Violation::new(
                    ErrorCode::OneOf,
                    ctx.path(),
                    format!("must be one of: {}", self.values.join(", ")),
                ))
            }
            _ => Violations::new(),
        }
    }

    fn name(&self) -> &'static str {
        "one_of"
    }

    fn describe(&self) -> String {
        format!("one_of({})", self.values.join(", "))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ──────────────────────────────────────────────
// StringRules
// ──────────────────────────────────────────────

/// Rule-set coercing to [`Value::Text`] and checking string constraints.
///
/// Builders return new values and share the untouched chain suffix with the
/// original; adding the same flag twice returns the original unchanged.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    chain: Chain,
}

impl StringRules {
    pub fn new() -> Self {
        StringRules {
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
        StringRules {
            chain: self.chain.with(Arc::new(RequiredFlag)),
        }
    }

    pub fn with_min_length(self, min: usize) -> Self {
        StringRules {
            chain: self.chain.with(Arc::new(MinLengthRule { min })),
        }
    }

    pub fn with_max_length(self, max: usize) -> Self {
        StringRules {
            chain: self.chain.with(Arc::new(MaxLengthRule { max })),
        }
    }

    pub fn with_pattern(self, regex: Regex) -> Self {
        StringRules {
            chain: self.chain.with(Arc::new(PatternRule { regex })),
        }
    }

    pub fn with_one_of<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringRules {
            chain: self.chain.with(Arc::new(OneOfRule {
                values: values.into_iter().map(Into::into).collect(),
            })),
        }
    }

    /// Coerce a compatible scalar into text. Numbers and booleans render
    /// to their canonical form; everything else is a type violation.
    fn coerce(&self, ctx: &Context, input: &Value) -> Result<Value, Violation> {
        match input {
            Value::Text(_) => Ok(input.clone()),
            Value::Int(i) => Ok(Value::Text(i.to_string())),
            Value::Decimal(d) => Ok(Value::Text(d.to_string())),
            Value::Bool(b) => Ok(Value::Text(b.to_string())),
            other => Err(Violation::new(
                ErrorCode::Type,
                ctx.path(),
                format!("expected Text, got {}", other.type_name()),
            )),
        }
    }
}

impl Rule for StringRules {
    fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        self.chain.evaluate(ctx, value)
    }

    fn name(&self) -> &'static str {
        "string"
    }

    fn describe(&self) -> String {
        format!("string({})", self.chain.describe())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl RuleSet for StringRules {
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
