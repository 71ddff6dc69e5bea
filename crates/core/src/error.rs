//! Violation and schema-error types.
//!
//! Two distinct failure families:
//! - [`Violation`] / [`Violations`] -- validation-time findings. These are
//!   data, not `Err` values: every field task contributes its findings and
//!   the full set is returned together.
//! - [`SchemaError`] -- schema-construction defects (dependency cycles,
//!   dynamic keys in conditionals). Builders return these as `Result` and
//!   construction halts; they are never surfaced as per-input violations.

use serde::Serialize;
use std::fmt;

// ──────────────────────────────────────────────
// Error codes
// ──────────────────────────────────────────────

/// Stable machine-readable code carried by every violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Mandatory field absent from the input.
    Required,
    /// Field present but not claimed by any rule (unknown fields disallowed).
    Unexpected,
    /// Value shape incompatible with the rule-set's target type.
    Type,
    /// Numeric value below the declared minimum.
    Min,
    /// Numeric value above the declared maximum.
    Max,
    /// Text shorter than the declared minimum length.
    MinLength,
    /// Text longer than the declared maximum length.
    MaxLength,
    /// Text does not match the declared pattern.
    Pattern,
    /// Value not among the declared allowed values.
    OneOf,
    /// The evaluation deadline elapsed.
    Timeout,
    /// The evaluation was cancelled.
    Cancelled,
    /// Programmer or configuration defect (bad output target, unassignable
    /// type). Never caused by user input.
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Required => "required",
            ErrorCode::Unexpected => "unexpected",
            ErrorCode::Type => "type",
            ErrorCode::Min => "min",
            ErrorCode::Max => "max",
            ErrorCode::MinLength => "min_length",
            ErrorCode::MaxLength => "max_length",
            ErrorCode::Pattern => "pattern",
            ErrorCode::OneOf => "one_of",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Violations
// ──────────────────────────────────────────────

/// One validation finding: a stable code, a slash-delimited field path
/// (`/address/city`; the root is the empty path), and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub code: ErrorCode,
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn required(path: impl Into<String>) -> Self {
        Violation::new(ErrorCode::Required, path, "field is required")
    }

    pub fn unexpected(path: impl Into<String>) -> Self {
        Violation::new(ErrorCode::Unexpected, path, "field is not expected here")
    }

    pub fn internal(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation::new(ErrorCode::Internal, path, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.code, self.message)
    }
}

/// Append `key` to a slash-delimited field path.
pub fn join_path(base: &str, key: &str) -> String {
    format!("{}/{}", base, key)
}

/// Ordered collection of violations.
///
/// Collections from concurrent tasks are concatenated; order across
/// independent fields is not guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Violations(Vec::new())
    }

    pub fn of(violation: Violation) -> Self {
        Violations(vec![violation])
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// Concatenate another collection onto this one.
    pub fn merge(&mut self, other: Violations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "violations": self.0.iter().map(|v| serde_json::json!({
                "code": v.code.as_str(),
                "path": v.path,
                "message": v.message,
            })).collect::<Vec<_>>()
        })
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ──────────────────────────────────────────────
// Schema construction errors
// ──────────────────────────────────────────────

/// Errors raised while a schema is being built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Registering a conditional dependency closed a cycle in the field
    /// dependency graph.
    #[error("field dependency cycle detected: {path}")]
    DependencyCycle { path: String },

    /// A conditional rule was registered against a pattern or predicate
    /// key. Only constant keys can participate in dependency ordering.
    #[error("dynamic keys are not supported in conditional rules: {key}")]
    DynamicConditionKey { key: String },
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
