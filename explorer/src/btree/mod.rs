//! In-memory B-tree simulation engine.
//!
//! The tree is a persistent (copy-on-write) structure: every insert and
//! delete returns a new [`Tree`] snapshot and leaves the old one intact.
//!
//! # Structure
//!
//! - [`Node`]: keys plus child pointers; a node without children is a leaf
//! - [`Tree`]: order, optional root and the node id counter
//!
//! # Usage
//!
//! ```
//! use explorer::btree::{Order, Tree};
//!
//! let order = Order::new(3).unwrap_or_default();
//! let tree = [10, 20, 30]
//!     .into_iter()
//!     .fold(Tree::new(order), |tree, key| tree.insert(key).tree);
//!
//! assert_eq!(tree.height(), 2);
//! assert_eq!(tree.root().map(|r| r.keys().to_vec()), Some(vec![20]));
//! assert!(tree.search(30).found);
//! ```

mod invariants;
mod node;
#[cfg(test)]
mod proptests;
mod stats;
mod tree;

pub use invariants::{InvariantViolation, check_tree};
pub use node::{Key, MIN_ORDER, Node, NodeId, Order};
pub use stats::TreeStats;
pub use tree::{
    DeleteOutcome, DeletePolicy, DeleteResult, InsertOutcome, InsertResult, Rejection,
    SearchResult, SplitEvent, Tree,
};
