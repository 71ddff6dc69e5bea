//! Known-field tracker.
//!
//! Records which input keys were claimed by some rule during one Apply so
//! that unclaimed keys can be reported as unexpected afterwards. Tracking
//! is skipped entirely when unknown fields are allowed or the input is not
//! map-shaped; an inactive tracker accepts adds as no-ops and reports
//! nothing.

use std::collections::BTreeSet;
use std::sync::Mutex;

use sift_core::error::{join_path, Violation, Violations};

/// Claim set shared across field tasks. Interior mutability keeps the
/// tracker usable behind an `Arc` without holding the output lock.
#[derive(Debug)]
pub struct KnownFields {
    active: bool,
    claimed: Mutex<BTreeSet<String>>,
}

impl KnownFields {
    pub fn new(active: bool) -> Self {
        KnownFields {
            active,
            claimed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mark `key` as claimed by some rule.
    pub fn add(&self, key: &str) {
        if !self.active {
            return;
        }
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// Input keys no rule claimed. Meaningful only while the tracker is
    /// active; an inactive tracker reports every key unknown and callers
    /// must not rely on it.
    pub fn unknown(&self, input_keys: &[String]) -> Vec<String> {
        let claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        input_keys
            .iter()
            .filter(|k| !claimed.contains(*k))
            .cloned()
            .collect()
    }

    /// Render each unclaimed key as an unexpected-field violation under
    /// `path`. Inactive trackers report nothing.
    pub fn check(&self, input_keys: &[String], path: &str) -> Violations {
        let mut violations = Violations::new();
        if !self.active {
            return violations;
        }
        for key in self.unknown(input_keys) {
            violations.push(Violation::unexpected(join_path(path, &key)));
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
    use sift_core::error::ErrorCode;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unclaimed_keys_become_unexpected_violations() {
        let tracker = KnownFields::new(true);
        tracker.add("name");
        let vs = tracker.check(&keys(&["name", "extra"]), "");
        assert_eq!(vs.len(), 1);
        let v = vs.iter().next().unwrap();
        assert_eq!(v.code, ErrorCode::Unexpected);
        assert_eq!(v.path, "/extra");
    }

    #[test]
    fn inactive_tracker_reports_nothing() {
        let tracker = KnownFields::new(false);
        tracker.add("name");
        assert!(!tracker.is_claimed("name"));
        assert!(tracker.check(&keys(&["name", "extra"]), "").is_empty());
    }

    #[test]
    fn unknown_filters_claimed_keys() {
        let tracker = KnownFields::new(true);
        tracker.add("a");
        tracker.add("b");
        assert_eq!(tracker.unknown(&keys(&["a", "b", "c"])), keys(&["c"]));
    }
}
