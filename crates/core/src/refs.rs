//! Field dependency graph for conditional rules.
//!
//! An edge A -> B records that A's condition must not run until every rule
//! targeting B has completed. The graph is built at schema-construction
//! time and must stay acyclic: each registration runs a depth-first check
//! and fails with [`SchemaError::DependencyCycle`] if the new edge closes a
//! loop. Cycles are configuration defects, never validation-time findings.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SchemaError;
use crate::matcher::KeyMatcher;

// ──────────────────────────────────────────────
// ReferenceGraph
// ──────────────────────────────────────────────

/// Directed dependency graph over constant field keys.
///
/// `Clone` deep-copies the edge map, so schema variants built from a common
/// parent never share mutable graph state.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        ReferenceGraph {
            edges: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Keys `key`'s condition depends on, if any were registered.
    pub fn dependencies(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(key)
    }

    /// Register "`dependent`'s condition waits for `depends_on`".
    ///
    /// Only constant keys can participate: dependency settlement is tracked
    /// per concrete field, so a pattern or predicate matcher on the
    /// registering side is rejected outright rather than silently ignored.
    /// If inserting the edge closes a cycle, the edge is removed again and
    /// the registration fails; the caller is expected to halt schema
    /// construction.
    pub fn add(&mut self, dependent: &KeyMatcher, depends_on: &str) -> Result<(), SchemaError> {
        let key = match dependent.constant_key() {
            Some(key) => key.to_string(),
            None => {
                return Err(SchemaError::DynamicConditionKey {
                    key: dependent.label(),
                })
            }
        };

        let inserted = self
            .edges
            .entry(key.clone())
            .or_default()
            .insert(depends_on.to_string());

        if let Err(err) = self.check_cycles_from(&key) {
            if inserted {
                if let Some(deps) = self.edges.get_mut(&key) {
                    deps.remove(depends_on);
                    if deps.is_empty() {
                        self.edges.remove(&key);
                    }
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Depth-first cycle check from `start`. A node revisited while still
    /// on the active recursion stack closes a cycle.
    fn check_cycles_from(&self, start: &str) -> Result<(), SchemaError> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut in_path: BTreeSet<&str> = BTreeSet::new();
        let mut path: Vec<&str> = Vec::new();
        self.dfs(start, &mut visited, &mut in_path, &mut path)
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut BTreeSet<&'a str>,
        in_path: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), SchemaError> {
        path.push(node);
        in_path.insert(node);

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if in_path.contains(dep.as_str()) {
                    let cycle_start = path
                        .iter()
                        .position(|&n| n == dep.as_str())
                        .unwrap_or(0);
                    let mut cycle_nodes: Vec<&str> = path[cycle_start..].to_vec();
                    cycle_nodes.push(dep);
                    return Err(SchemaError::DependencyCycle {
                        path: cycle_nodes.join(" \u{2192} "),
                    });
                }
                if !visited.contains(dep.as_str()) {
                    self.dfs(dep, visited, in_path, path)?;
                }
            }
        }

        in_path.remove(node);
        visited.insert(node);
        path.pop();
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
