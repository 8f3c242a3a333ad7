//! Structural invariant checking.
//!
//! Used after every operation in tests and by the simulator in debug
//! builds to catch broken trees early.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::btree::node::{Key, Node, NodeId};
use crate::btree::tree::Tree;

/// An invariant violation found in a tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Node where it was detected.
    pub node: NodeId,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.node)
    }
}

/// Check every structural invariant of `tree`.
///
/// - keys strictly ascending in every node
/// - at most `max_keys` keys per node
/// - internal nodes have `keys + 1` children
/// - every key inside its separator bounds
/// - all leaves at the same depth
/// - no key stored twice, no node id used twice
#[must_use]
pub fn check_tree(tree: &Tree) -> Vec<InvariantViolation> {
    let mut checker = InvariantChecker::new(tree.order().max_keys());
    if let Some(root) = tree.root() {
        checker.visit(root, 0, None, None);
    }
    checker.violations
}

struct InvariantChecker {
    max_keys: usize,
    leaf_depth: Option<usize>,
    seen_keys: HashSet<Key>,
    seen_ids: HashSet<NodeId>,
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    fn new(max_keys: usize) -> Self {
        Self {
            max_keys,
            leaf_depth: None,
            seen_keys: HashSet::new(),
            seen_ids: HashSet::new(),
            violations: Vec::new(),
        }
    }

    fn report(&mut self, node: &Node, description: String) {
        self.violations.push(InvariantViolation {
            description,
            node: node.id(),
        });
    }

    fn visit(&mut self, node: &Node, depth: usize, lower: Option<Key>, upper: Option<Key>) {
        if !self.seen_ids.insert(node.id()) {
            self.report(node, format!("node id {} appears twice", node.id()));
        }

        let keys = node.keys();
        if keys.len() > self.max_keys {
            self.report(
                node,
                format!("{} keys exceeds maximum of {}", keys.len(), self.max_keys),
            );
        }
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            self.report(node, format!("keys not strictly ascending: {keys:?}"));
        }
        for &key in keys {
            if lower.is_some_and(|l| key <= l) || upper.is_some_and(|u| key >= u) {
                self.report(
                    node,
                    format!("key {key} outside bounds ({lower:?}, {upper:?})"),
                );
            }
            if !self.seen_keys.insert(key) {
                self.report(node, format!("key {key} stored more than once"));
            }
        }

        if node.is_leaf() {
            match self.leaf_depth {
                None => self.leaf_depth = Some(depth),
                Some(expected) if expected != depth => self.report(
                    node,
                    format!("leaf at depth {depth}, expected {expected}"),
                ),
                Some(_) => {}
            }
            return;
        }

        if node.children().len() != keys.len() + 1 {
            self.report(
                node,
                format!(
                    "{} keys but {} children",
                    keys.len(),
                    node.children().len()
                ),
            );
        }
        for (i, child) in node.children().iter().enumerate() {
            let child_lower = if i == 0 { lower } else { keys.get(i - 1).copied() };
            let child_upper = keys.get(i).copied().or(upper);
            self.visit(child, depth + 1, child_lower, child_upper);
        }
    }
}
