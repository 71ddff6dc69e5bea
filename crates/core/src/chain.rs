//! Persistent constraint chain with structural conflict resolution.
//!
//! A chain is a backward-linked list of constraint nodes: the head is the
//! most recently added rule, each node links to its parent, the root has
//! none. Chains are immutable; [`Chain::with`] produces a new chain and
//! shares every untouched parent suffix with the original, so extension is
//! O(1) in allocations when nothing conflicts and callers can test
//! idempotence by head identity ([`Chain::identical`]).

use std::sync::Arc;

use crate::error::Violations;
use crate::rule::{Context, Rule};
use crate::value::Value;

// ──────────────────────────────────────────────
// Node
// ──────────────────────────────────────────────

/// One link of a constraint chain. Immutable once constructed.
pub struct Node {
    rule: Arc<dyn Rule>,
    parent: Option<Arc<Node>>,
}

impl Node {
    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    pub fn parent(&self) -> Option<&Arc<Node>> {
        self.parent.as_ref()
    }
}

// ──────────────────────────────────────────────
// Chain
// ──────────────────────────────────────────────

/// A possibly-empty constraint chain. A rule-set value is a chain head.
#[derive(Clone, Default)]
pub struct Chain {
    head: Option<Arc<Node>>,
}

impl Chain {
    pub fn empty() -> Self {
        Chain { head: None }
    }

    /// Single-node chain, for rules constructed outside a builder.
    pub fn of(rule: Arc<dyn Rule>) -> Self {
        Chain::empty().with(rule)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<&Arc<Node>> {
        self.head.as_ref()
    }

    /// Link `rule` at the head, pruning every existing node it conflicts
    /// with first.
    ///
    /// The walk runs head -> root: a node whose rule reports
    /// `conflicts_with(rule)` is dropped and the walk continues from its
    /// parent, so conflicting ancestors several levels up are pruned too.
    /// The relative order of surviving nodes is preserved, and any suffix
    /// that lost no node is reused as-is rather than rebuilt.
    ///
    /// A parentless node whose rule conflicts with `rule` prunes to the
    /// empty chain; conflict resolution never fails.
    pub fn with(&self, rule: Arc<dyn Rule>) -> Chain {
        let parent = prune(&self.head, rule.as_ref());
        Chain {
            head: Some(Arc::new(Node { rule, parent })),
        }
    }

    /// Head-identity comparison. Two chains built by the same sequence of
    /// idempotent additions share their head node, so this is the cheap
    /// "did that builder call change anything" test.
    pub fn identical(&self, other: &Chain) -> bool {
        match (&self.head, &other.head) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// First rule in the chain downcastable to `T`, if any.
    pub fn find<T: Rule + 'static>(&self) -> Option<&T> {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if let Some(found) = n.rule.as_any().downcast_ref::<T>() {
                return Some(found);
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// All rules, head first.
    pub fn rules(&self) -> Vec<Arc<dyn Rule>> {
        let mut out = Vec::new();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            out.push(n.rule.clone());
            node = n.parent.as_deref();
        }
        out
    }

    /// Evaluate every rule head -> root, concatenating violations.
    pub fn evaluate(&self, ctx: &Context, value: &Value) -> Violations {
        let mut violations = Violations::new();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            violations.merge(n.rule.evaluate(ctx, value));
            node = n.parent.as_deref();
        }
        violations
    }

    /// Render every rule's label in insertion order (root first), which is
    /// the exact order the constraints were added in.
    pub fn describe(&self) -> String {
        let mut labels: Vec<String> = self.rules().iter().map(|r| r.describe()).collect();
        labels.reverse();
        labels.join(", ")
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chain[{}]", self.describe())
    }
}

/// Rebuild `node`'s chain without any node conflicting with `probe`,
/// preserving order and sharing every unchanged suffix.
fn prune(node: &Option<Arc<Node>>, probe: &dyn Rule) -> Option<Arc<Node>> {
    let n = node.as_ref()?;
    let parent = prune(&n.parent, probe);
    if n.rule.conflicts_with(probe) {
        return parent;
    }
    let parent_unchanged = match (&parent, &n.parent) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    };
    if parent_unchanged {
        Some(n.clone())
    } else {
        Some(Arc::new(Node {
            rule: n.rule.clone(),
            parent,
        }))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
