//! Leaf rule-sets: string, numeric, and boolean constraint families.
//!
//! Every rule-set here is a thin value over a [`Chain`](crate::chain::Chain):
//! builder methods link constraint nodes, and re-adding a constraint
//! supersedes the previous one through the chain's conflict resolution.

pub mod boolean;
pub mod numeric;
pub mod string;

pub use boolean::BoolRules;
pub use numeric::{DecimalRules, IntRules, MaxRule, MinRule};
pub use string::{MaxLengthRule, MinLengthRule, OneOfRule, PatternRule, StringRules};

use crate::error::Violations;
use crate::rule::{Context, Rule};
use crate::value::Value;

// ──────────────────────────────────────────────
// RequiredFlag
// ──────────────────────────────────────────────

/// Marker rule recording that a field must be present.
///
/// Absence itself is checked by the engine before any value rule runs, so
/// evaluating the flag against a value that exists finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredFlag;

impl Rule for RequiredFlag {
    fn evaluate(&self, _ctx: &Context, _value: &Value) -> Violations {
        Violations::new()
    }

    fn name(&self) -> &'static str {
        "required"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
