//! Copy-on-write B-tree operations.
//!
//! A [`Tree`] is a snapshot value. `insert` and `delete` never touch the
//! receiver; they return a new snapshot that shares every untouched subtree
//! with the old one. Only the nodes along the touched path (plus any sibling
//! involved in a split, borrow or merge) are rebuilt.
//!
//! None of the operations can fail on integer input. Requests that cannot be
//! applied (duplicate insert, absent key, empty tree) come back as a
//! [`Rejection`] inside the outcome and leave the snapshot unchanged.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::btree::node::{Key, Node, NodeId, Order};

/// Why an operation left the tree unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Insert of a key that is already stored.
    KeyAlreadyExists,
    /// Search or delete of a key that is not stored.
    KeyNotFound,
    /// Search or delete on a tree without a root.
    EmptyTree,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyAlreadyExists => write!(f, "key already exists"),
            Self::KeyNotFound => write!(f, "key not found"),
            Self::EmptyTree => write!(f, "tree is empty"),
        }
    }
}

/// How `delete` repairs nodes left with too few keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Only nodes that become empty are repaired. The empty node is spliced
    /// out of its parent together with the separating key, which moves into
    /// the adjacent sibling; when that sibling is full, a key is rotated in
    /// from it instead. Non-root nodes may stay below `min_keys`.
    #[default]
    Simplified,
    /// Textbook deletion: every non-root node keeps at least `min_keys` keys
    /// by borrowing from a sibling with spare keys or merging with one.
    Rebalance,
}

impl DeletePolicy {
    /// Parse a policy name (`simplified` or `rebalance`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simplified" => Some(Self::Simplified),
            "rebalance" => Some(Self::Rebalance),
            _ => None,
        }
    }

    /// Fewest keys a non-root node may hold before it is repaired.
    const fn floor(self, order: Order) -> usize {
        match self {
            Self::Simplified => 1,
            Self::Rebalance => order.min_keys(),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simplified => write!(f, "simplified"),
            Self::Rebalance => write!(f, "rebalance"),
        }
    }
}

/// Result of [`Tree::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub found: bool,
    /// Root-to-hit (or root-to-leaf) node ids, in visiting order.
    pub path: Vec<NodeId>,
    /// Depth of the last visited node. The root is depth 0.
    pub depth: usize,
}

impl SearchResult {
    /// The rejection behind a miss, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        if self.found {
            None
        } else if self.path.is_empty() {
            Some(Rejection::EmptyTree)
        } else {
            Some(Rejection::KeyNotFound)
        }
    }
}

/// A node split that happened during an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitEvent {
    /// The overflowing node. It keeps its id and becomes the left half.
    pub node: NodeId,
    /// The new right half.
    pub right: NodeId,
    /// Key promoted into the parent.
    pub promoted: Key,
    /// Depth of the split node before the split.
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted {
        /// The tree was empty and the key became a new root leaf.
        new_root: bool,
        /// The root split and the tree grew by one level.
        root_split: bool,
    },
    Rejected(Rejection),
}

impl InsertOutcome {
    #[must_use]
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

/// Result of [`Tree::insert`].
#[derive(Debug, Clone)]
pub struct InsertResult {
    pub tree: Tree,
    pub outcome: InsertOutcome,
    /// Nodes visited on the way down to the leaf that received the key.
    pub path: Vec<NodeId>,
    /// Splits in the order they happened, deepest first.
    pub splits: Vec<SplitEvent>,
}

impl InsertResult {
    #[must_use]
    pub fn did_split(&self) -> bool {
        !self.splits.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted {
        /// Predecessor that replaced the key when it sat in an internal node.
        predecessor: Option<Key>,
        /// The root collapsed into its only child.
        height_decreased: bool,
        /// The last key was removed.
        emptied: bool,
    },
    Rejected(Rejection),
}

impl DeleteOutcome {
    #[must_use]
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

/// Result of [`Tree::delete`].
#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub tree: Tree,
    pub outcome: DeleteOutcome,
    /// Nodes visited while locating the key (and its predecessor).
    pub path: Vec<NodeId>,
}

/// An immutable B-tree snapshot.
#[derive(Debug, Clone)]
pub struct Tree {
    order: Order,
    root: Option<Arc<Node>>,
    next_id: u64,
}

impl Tree {
    /// Create an empty tree.
    #[must_use]
    pub const fn new(order: Order) -> Self {
        Self {
            order,
            root: None,
            next_id: 1,
        }
    }

    #[must_use]
    pub const fn order(&self) -> Order {
        self.order
    }

    #[must_use]
    pub fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of levels. An empty tree has height 0.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            height += 1;
            node = current.children().first().map(AsRef::as_ref);
        }
        height
    }

    /// Every key in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        fn walk(node: &Node, out: &mut Vec<Key>) {
            if node.is_leaf() {
                out.extend_from_slice(node.keys());
                return;
            }
            for (i, child) in node.children().iter().enumerate() {
                walk(child, out);
                if let Some(key) = node.keys().get(i) {
                    out.push(*key);
                }
            }
        }

        let mut out = Vec::new();
        if let Some(root) = self.root() {
            walk(root, &mut out);
        }
        out
    }

    #[must_use]
    pub fn contains(&self, key: Key) -> bool {
        self.search(key).found
    }

    /// Look up `key`, recording the traversal.
    #[must_use]
    pub fn search(&self, key: Key) -> SearchResult {
        let mut path = Vec::new();
        let Some(mut node) = self.root() else {
            return SearchResult {
                found: false,
                path,
                depth: 0,
            };
        };

        loop {
            path.push(node.id());
            if node.contains_key(key) || node.is_leaf() {
                let found = node.contains_key(key);
                let depth = path.len() - 1;
                return SearchResult { found, path, depth };
            }
            node = &node.children()[node.find_child_index(key)];
        }
    }

    /// Insert `key`, splitting overflowing nodes on the way back up.
    #[must_use]
    pub fn insert(&self, key: Key) -> InsertResult {
        let mut next = self.clone();

        let Some(root) = self.root.as_deref() else {
            let id = next.allocate_id();
            next.root = Some(Arc::new(Node::leaf(id, vec![key])));
            return InsertResult {
                tree: next,
                outcome: InsertOutcome::Inserted {
                    new_root: true,
                    root_split: false,
                },
                path: Vec::new(),
                splits: Vec::new(),
            };
        };

        let lookup = self.search(key);
        if lookup.found {
            return InsertResult {
                tree: next,
                outcome: InsertOutcome::Rejected(Rejection::KeyAlreadyExists),
                path: lookup.path,
                splits: Vec::new(),
            };
        }

        let mut cx = InsertContext {
            key,
            max_keys: self.order.max_keys(),
            next_id: &mut next.next_id,
            path: Vec::new(),
            splits: Vec::new(),
        };
        let inserted = insert_into(root, 0, &mut cx);
        let InsertContext { path, splits, .. } = cx;

        let root_split = match inserted {
            Inserted::Fits(node) => {
                next.root = Some(Arc::new(node));
                false
            }
            Inserted::Split {
                left,
                promoted,
                right,
            } => {
                // No parent left to absorb the promoted key: grow a new root
                let id = next.allocate_id();
                next.root = Some(Arc::new(Node::from_parts(
                    id,
                    vec![promoted],
                    vec![Arc::new(left), Arc::new(right)],
                )));
                true
            }
        };

        InsertResult {
            tree: next,
            outcome: InsertOutcome::Inserted {
                new_root: false,
                root_split,
            },
            path,
            splits,
        }
    }

    /// Delete `key`, repairing emptied or underfull nodes per `policy`.
    #[must_use]
    pub fn delete(&self, key: Key, policy: DeletePolicy) -> DeleteResult {
        let Some(root) = self.root.as_deref() else {
            return DeleteResult {
                tree: self.clone(),
                outcome: DeleteOutcome::Rejected(Rejection::EmptyTree),
                path: Vec::new(),
            };
        };

        let mut cx = DeleteContext {
            floor: policy.floor(self.order),
            max_keys: self.order.max_keys(),
            prefer_merge: policy == DeletePolicy::Simplified,
            path: Vec::new(),
            predecessor: None,
        };

        let Some(new_root) = delete_from(root, key, &mut cx) else {
            return DeleteResult {
                tree: self.clone(),
                outcome: DeleteOutcome::Rejected(Rejection::KeyNotFound),
                path: cx.path,
            };
        };

        let mut next = self.clone();
        let mut height_decreased = false;
        next.root = if new_root.key_count() > 0 {
            Some(Arc::new(new_root))
        } else if new_root.is_leaf() {
            None
        } else {
            // A root without keys has exactly one child left
            height_decreased = true;
            new_root.children().first().map(Arc::clone)
        };

        DeleteResult {
            outcome: DeleteOutcome::Deleted {
                predecessor: cx.predecessor,
                height_decreased,
                emptied: next.root.is_none(),
            },
            tree: next,
            path: cx.path,
        }
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

struct InsertContext<'a> {
    key: Key,
    max_keys: usize,
    next_id: &'a mut u64,
    path: Vec<NodeId>,
    splits: Vec<SplitEvent>,
}

impl InsertContext<'_> {
    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(*self.next_id);
        *self.next_id += 1;
        id
    }
}

enum Inserted {
    Fits(Node),
    Split { left: Node, promoted: Key, right: Node },
}

fn insert_into(node: &Node, depth: usize, cx: &mut InsertContext<'_>) -> Inserted {
    cx.path.push(node.id());

    let mut keys = node.keys().to_vec();
    let mut children = node.children().to_vec();

    if node.is_leaf() {
        let pos = keys.partition_point(|k| *k < cx.key);
        keys.insert(pos, cx.key);
    } else {
        let idx = node.find_child_index(cx.key);
        match insert_into(&node.children()[idx], depth + 1, cx) {
            Inserted::Fits(child) => children[idx] = Arc::new(child),
            Inserted::Split {
                left,
                promoted,
                right,
            } => {
                children[idx] = Arc::new(left);
                keys.insert(idx, promoted);
                children.insert(idx + 1, Arc::new(right));
            }
        }
    }

    let rebuilt = Node::from_parts(node.id(), keys, children);
    if rebuilt.key_count() <= cx.max_keys {
        return Inserted::Fits(rebuilt);
    }

    let right_id = cx.allocate_id();
    let (left, promoted, right) = rebuilt.split(right_id);
    cx.splits.push(SplitEvent {
        node: left.id(),
        right: right.id(),
        promoted,
        depth,
    });
    Inserted::Split {
        left,
        promoted,
        right,
    }
}

struct DeleteContext {
    floor: usize,
    max_keys: usize,
    prefer_merge: bool,
    path: Vec<NodeId>,
    predecessor: Option<Key>,
}

/// Remove `key` from the subtree at `node`.
///
/// Returns the rebuilt node, or `None` when the key is not in the subtree.
/// The returned node may be underfull; its parent repairs it.
fn delete_from(node: &Node, key: Key, cx: &mut DeleteContext) -> Option<Node> {
    cx.path.push(node.id());
    let position = node.keys().binary_search(&key);

    if node.is_leaf() {
        let pos = position.ok()?;
        let mut keys = node.keys().to_vec();
        keys.remove(pos);
        return Some(Node::leaf(node.id(), keys));
    }

    let mut keys = node.keys().to_vec();
    let mut children = node.children().to_vec();

    let idx = if let Ok(pos) = position {
        // Internal hit: pull the in-order predecessor up from the left subtree
        let predecessor = children[pos].max_key()?;
        let child = delete_from(&children[pos], predecessor, cx)?;
        keys[pos] = predecessor;
        children[pos] = Arc::new(child);
        cx.predecessor = Some(predecessor);
        pos
    } else {
        let idx = node.find_child_index(key);
        let child = delete_from(&children[idx], key, cx)?;
        children[idx] = Arc::new(child);
        idx
    };

    repair_child(&mut keys, &mut children, idx, cx);
    Some(Node::from_parts(node.id(), keys, children))
}

#[derive(Debug, Clone, Copy)]
enum Repair {
    BorrowLeft,
    BorrowRight,
    MergeLeft,
    MergeRight,
}

/// Fix `children[idx]` if it dropped below the policy floor.
fn repair_child(
    keys: &mut Vec<Key>,
    children: &mut Vec<Arc<Node>>,
    idx: usize,
    cx: &DeleteContext,
) {
    let count = children[idx].key_count();
    if count >= cx.floor {
        return;
    }

    let left = idx.checked_sub(1).map(|i| children[i].key_count());
    let right = children.get(idx + 1).map(|c| c.key_count());

    let feasible = |repair: Repair| match repair {
        Repair::BorrowLeft => left.is_some_and(|n| n > cx.floor),
        Repair::BorrowRight => right.is_some_and(|n| n > cx.floor),
        Repair::MergeLeft => left.is_some_and(|n| n + 1 + count <= cx.max_keys),
        Repair::MergeRight => right.is_some_and(|n| n + 1 + count <= cx.max_keys),
    };

    let preference = if cx.prefer_merge {
        [
            Repair::MergeLeft,
            Repair::MergeRight,
            Repair::BorrowLeft,
            Repair::BorrowRight,
        ]
    } else {
        [
            Repair::BorrowLeft,
            Repair::BorrowRight,
            Repair::MergeLeft,
            Repair::MergeRight,
        ]
    };

    let Some(repair) = preference.into_iter().find(|r| feasible(*r)) else {
        tracing::warn!(
            node = %children[idx].id(),
            keys = count,
            "underfull node has no sibling to borrow from or merge with"
        );
        return;
    };

    match repair {
        Repair::BorrowLeft => rotate_from_left(keys, children, idx),
        Repair::BorrowRight => rotate_from_right(keys, children, idx),
        Repair::MergeLeft => {
            let survivor = children[idx - 1].id();
            merge_pair(keys, children, idx - 1, survivor);
        }
        Repair::MergeRight => {
            let survivor = children[idx + 1].id();
            merge_pair(keys, children, idx, survivor);
        }
    }
}

/// Move the left sibling's last key up into the parent and the parent's
/// separator down into `children[idx]`.
fn rotate_from_left(keys: &mut [Key], children: &mut [Arc<Node>], idx: usize) {
    let left = &children[idx - 1];
    let child = &children[idx];

    let mut left_keys = left.keys().to_vec();
    let mut left_children = left.children().to_vec();
    let Some(moved) = left_keys.pop() else {
        return;
    };
    let separator = std::mem::replace(&mut keys[idx - 1], moved);

    let mut child_keys = Vec::with_capacity(child.key_count() + 1);
    child_keys.push(separator);
    child_keys.extend_from_slice(child.keys());

    let mut child_children = Vec::with_capacity(child.children().len() + 1);
    child_children.extend(left_children.pop());
    child_children.extend(child.children().iter().map(Arc::clone));

    let new_left = Node::from_parts(left.id(), left_keys, left_children);
    let new_child = Node::from_parts(child.id(), child_keys, child_children);
    children[idx - 1] = Arc::new(new_left);
    children[idx] = Arc::new(new_child);
}

/// Move the right sibling's first key up into the parent and the parent's
/// separator down into `children[idx]`.
fn rotate_from_right(keys: &mut [Key], children: &mut [Arc<Node>], idx: usize) {
    let child = &children[idx];
    let right = &children[idx + 1];

    if right.key_count() == 0 {
        return;
    }
    let mut right_keys = right.keys().to_vec();
    let mut right_children = right.children().to_vec();
    let moved = right_keys.remove(0);
    let separator = std::mem::replace(&mut keys[idx], moved);

    let mut child_keys = child.keys().to_vec();
    child_keys.push(separator);

    let mut child_children = child.children().to_vec();
    if !right_children.is_empty() {
        child_children.push(right_children.remove(0));
    }

    let new_child = Node::from_parts(child.id(), child_keys, child_children);
    let new_right = Node::from_parts(right.id(), right_keys, right_children);
    children[idx] = Arc::new(new_child);
    children[idx + 1] = Arc::new(new_right);
}

/// Merge `children[left_idx + 1]` into `children[left_idx]` around their
/// separator. The merged node takes `survivor` as its id, so the underfull
/// node is the one spliced out of the parent.
fn merge_pair(
    keys: &mut Vec<Key>,
    children: &mut Vec<Arc<Node>>,
    left_idx: usize,
    survivor: NodeId,
) {
    let right = children.remove(left_idx + 1);
    let separator = keys.remove(left_idx);
    let left = &children[left_idx];

    let mut merged_keys = Vec::with_capacity(left.key_count() + 1 + right.key_count());
    merged_keys.extend_from_slice(left.keys());
    merged_keys.push(separator);
    merged_keys.extend_from_slice(right.keys());

    let mut merged_children = left.children().to_vec();
    merged_children.extend(right.children().iter().map(Arc::clone));

    children[left_idx] = Arc::new(Node::from_parts(survivor, merged_keys, merged_children));
}
