//! B-tree node model.
//!
//! Nodes are immutable once built. An operation that changes a node builds a
//! new version carrying the same [`NodeId`] and shares every untouched child
//! through [`Arc`], so older tree snapshots stay valid.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Key type stored in the tree.
pub type Key = i64;

/// Smallest order the engine accepts.
///
/// With order 3 a node holds at most 2 keys, which is the smallest size for
/// which splitting at the median leaves both halves non-empty.
pub const MIN_ORDER: usize = 3;

/// Identifier of a node, unique within one tree lineage.
///
/// Ids come from a monotonic counter carried by the tree snapshot. A node
/// keeps its id when it is rebuilt along a copy-on-write path; only the right
/// half of a split and a new root receive fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Maximum number of children a node may have.
///
/// `max_keys = order - 1`, `min_keys = ceil(order / 2) - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order(usize);

impl Order {
    /// Order used by the explorer until told otherwise.
    pub const DEFAULT: Self = Self(MIN_ORDER);

    /// Validate an order. Returns `None` below [`MIN_ORDER`].
    #[must_use]
    pub const fn new(order: usize) -> Option<Self> {
        if order >= MIN_ORDER {
            Some(Self(order))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Most keys a node may hold once an operation has completed.
    #[must_use]
    pub const fn max_keys(self) -> usize {
        self.0 - 1
    }

    /// Fewest keys a non-root node holds under textbook rebalancing.
    #[must_use]
    pub const fn min_keys(self) -> usize {
        self.0.div_ceil(2) - 1
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single B-tree node.
///
/// `children` is empty for a leaf; otherwise it holds exactly
/// `keys.len() + 1` entries. `Child[i]` holds keys < `Key[i]` and, for
/// `i > 0`, keys > `Key[i - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    /// Keys in strictly ascending order.
    keys: Vec<Key>,
    children: Vec<Arc<Node>>,
}

impl Node {
    /// Build a leaf node.
    #[must_use]
    pub(crate) const fn leaf(id: NodeId, keys: Vec<Key>) -> Self {
        Self {
            id,
            keys,
            children: Vec::new(),
        }
    }

    /// Build a node from its parts. An empty `children` makes a leaf.
    #[must_use]
    pub(crate) fn from_parts(id: NodeId, keys: Vec<Key>, children: Vec<Arc<Self>>) -> Self {
        debug_assert!(
            children.is_empty() || children.len() == keys.len() + 1,
            "internal node {id} has {} keys but {} children",
            keys.len(),
            children.len()
        );
        Self { id, keys, children }
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    #[must_use]
    pub fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Check whether this node itself holds `key`.
    #[must_use]
    pub fn contains_key(&self, key: Key) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Index of the child to descend into for `key`.
    ///
    /// This is the least `i` with `key <= keys[i]`, or the last child when
    /// every key is smaller.
    #[must_use]
    pub fn find_child_index(&self, key: Key) -> usize {
        self.keys.partition_point(|k| *k < key)
    }

    /// Largest key in the subtree rooted at this node.
    ///
    /// Always found in the rightmost leaf.
    #[must_use]
    pub fn max_key(&self) -> Option<Key> {
        let mut node = self;
        while let Some(last) = node.children.last() {
            node = last;
        }
        node.keys.last().copied()
    }

    /// Split an overflowing node at `floor(len / 2)`.
    ///
    /// Returns `(left, promoted, right)`. The left half keeps this node's id,
    /// the right half takes `right_id`. The promoted key belongs in the
    /// parent between the two halves.
    #[must_use]
    pub(crate) fn split(mut self, right_id: NodeId) -> (Self, Key, Self) {
        let mid = self.keys.len() / 2;
        let promoted = self.keys[mid];

        // Right node gets keys and children after the median
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = if self.children.is_empty() {
            Vec::new()
        } else {
            self.children.split_off(mid + 1)
        };

        // Drop the median from the left node
        self.keys.truncate(mid);

        let right = Self {
            id: right_id,
            keys: right_keys,
            children: right_children,
        };
        (self, promoted, right)
    }
}
