//! Sift schema core -- immutable constraint chains, rule capability traits,
//! field matchers, conditional-rule dependency tracking, and the leaf
//! rule-set families.
//!
//! Schemas are built once from composable, immutable pieces and shared
//! across any number of evaluations. The concurrent object engine that
//! applies them lives in the companion `sift-eval` crate.

pub mod chain;
pub mod error;
pub mod matcher;
pub mod refs;
pub mod rule;
pub mod rules;
pub mod value;

pub use chain::{Chain, Node};
pub use error::{join_path, ErrorCode, SchemaError, Violation, Violations};
pub use matcher::KeyMatcher;
pub use refs::ReferenceGraph;
pub use rule::{Condition, Context, Rule, RuleSet};
pub use rules::{
    BoolRules, DecimalRules, IntRules, MaxLengthRule, MaxRule, MinLengthRule, MinRule, OneOfRule,
    PatternRule, RequiredFlag, StringRules,
};
pub use value::{ConvertError, Value};

/// Re-exported so callers can drive cooperative cancellation without
/// depending on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
