//! Field-key matchers.
//!
//! A field rule targets input keys through a [`KeyMatcher`]: an exact key,
//! a regex pattern, or a named predicate. Exact matchers are checked by
//! direct comparison; dynamic matchers are checked against every key
//! actually present in a map-shaped input.

use regex::Regex;
use std::sync::Arc;

// ──────────────────────────────────────────────
// KeyMatcher
// ──────────────────────────────────────────────

#[derive(Clone)]
pub enum KeyMatcher {
    /// Matches one constant key by equality.
    Exact(String),
    /// Matches any key the regex accepts.
    Pattern(Regex),
    /// Matches any key the predicate accepts. The label stands in for the
    /// predicate in diagnostics and conflict checks, since closure equality
    /// is undecidable.
    Predicate {
        label: String,
        predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    },
}

impl KeyMatcher {
    pub fn exact(key: impl Into<String>) -> Self {
        KeyMatcher::Exact(key.into())
    }

    pub fn pattern(regex: Regex) -> Self {
        KeyMatcher::Pattern(regex)
    }

    pub fn predicate<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        KeyMatcher::Predicate {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Exact(k) => k == key,
            KeyMatcher::Pattern(re) => re.is_match(key),
            KeyMatcher::Predicate { predicate, .. } => predicate(key),
        }
    }

    /// The constant key, for exact matchers only. Dynamic matchers have no
    /// constant key and cannot participate in dependency ordering.
    pub fn constant_key(&self) -> Option<&str> {
        match self {
            KeyMatcher::Exact(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.constant_key().is_none()
    }

    /// Diagnostic label; doubles as the conflict identity for dynamic
    /// matchers.
    pub fn label(&self) -> String {
        match self {
            KeyMatcher::Exact(k) => k.clone(),
            KeyMatcher::Pattern(re) => format!("pattern({})", re.as_str()),
            KeyMatcher::Predicate { label, .. } => format!("predicate({})", label),
        }
    }

    /// Two matchers are the same target when their labels agree: equal key
    /// for exact matchers, equal pattern or predicate label otherwise.
    pub fn same_target(&self, other: &KeyMatcher) -> bool {
        self.label() == other.label()
    }
}

impl std::fmt::Debug for KeyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMatcher({})", self.label())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
