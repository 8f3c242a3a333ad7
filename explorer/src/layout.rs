//! Node placement for rendering.
//!
//! Layout is a pure function of tree shape and viewport width. Nothing is
//! cached; callers recompute it whenever they draw.
//!
//! Each node is centred in the horizontal span given to its subtree, and the
//! span is divided evenly among its children. The vertical position depends
//! only on depth.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::btree::{Key, Node, NodeId, Tree};

/// Vertical distance between levels.
pub const LEVEL_HEIGHT: f64 = 100.0;
/// `y` of the root.
pub const TOP_OFFSET: f64 = 60.0;
/// Horizontal space left free on each side of the viewport.
pub const SIDE_MARGIN: f64 = 50.0;
/// Minimum drawn width of a node.
pub const NODE_WIDTH: f64 = 120.0;
pub const NODE_HEIGHT: f64 = 40.0;
/// Width given to each key inside a node box.
const KEY_SLOT_WIDTH: f64 = 40.0;
const NODE_PADDING: f64 = 20.0;

/// A node with its computed position. `x`/`y` is the centre of the box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: NodeId,
    pub keys: Vec<Key>,
    pub is_leaf: bool,
    pub depth: usize,
    pub x: f64,
    pub y: f64,
    /// Drawn width of the node box.
    pub width: f64,
    pub children: Vec<PositionedNode>,
}

/// A parent-to-child connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
}

/// Link between neighbouring leaves, as drawn for B+ trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeafLink {
    pub from: NodeId,
    pub to: NodeId,
}

/// Assign coordinates to every node of `tree`.
///
/// Returns `None` for an empty tree.
#[must_use]
pub fn compute_layout(tree: &Tree, viewport_width: f64) -> Option<PositionedNode> {
    tree.root()
        .map(|root| position(root, 0, SIDE_MARGIN, viewport_width - SIDE_MARGIN))
}

/// Drawn width of a node holding `key_count` keys.
#[must_use]
pub fn node_width(key_count: usize) -> f64 {
    NODE_WIDTH.max(key_count as f64 * KEY_SLOT_WIDTH + NODE_PADDING)
}

fn position(node: &Node, depth: usize, left: f64, right: f64) -> PositionedNode {
    let children = if node.is_leaf() {
        Vec::new()
    } else {
        let slot = (right - left) / node.children().len() as f64;
        node.children()
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let start = (i as f64).mul_add(slot, left);
                position(child, depth + 1, start, start + slot)
            })
            .collect()
    };

    PositionedNode {
        id: node.id(),
        keys: node.keys().to_vec(),
        is_leaf: node.is_leaf(),
        depth,
        x: (left + right) / 2.0,
        y: (depth as f64).mul_add(LEVEL_HEIGHT, TOP_OFFSET),
        width: node_width(node.key_count()),
        children,
    }
}

impl PositionedNode {
    /// All nodes in pre-order.
    #[must_use]
    pub fn nodes(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&Self> {
        self.nodes().into_iter().find(|n| n.id == id)
    }

    /// Every parent-to-child edge, parents in pre-order.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes()
            .into_iter()
            .flat_map(|parent| {
                parent.children.iter().map(|child| Edge {
                    parent: parent.id,
                    child: child.id,
                })
            })
            .collect()
    }

    /// Leaves from left to right.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut leaves: Vec<&Self> = self.nodes().into_iter().filter(|n| n.is_leaf).collect();
        leaves.sort_by(|a, b| a.x.total_cmp(&b.x));
        leaves
    }

    /// Links between each leaf and its right neighbour.
    #[must_use]
    pub fn leaf_chain(&self) -> Vec<LeafLink> {
        self.leaves()
            .windows(2)
            .map(|pair| LeafLink {
                from: pair[0].id,
                to: pair[1].id,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::Order;

    fn build(keys: &[Key]) -> Tree {
        keys.iter()
            .fold(Tree::new(Order::DEFAULT), |tree, key| tree.insert(*key).tree)
    }

    #[test]
    fn test_empty_tree_has_no_layout() {
        assert!(compute_layout(&Tree::new(Order::DEFAULT), 800.0).is_none());
    }

    #[test]
    fn test_single_leaf_is_centred() {
        let Some(root) = compute_layout(&build(&[1]), 800.0) else {
            panic!("expected a layout");
        };

        assert!((root.x - 400.0).abs() < 1e-9);
        assert!((root.y - TOP_OFFSET).abs() < 1e-9);
        assert!((root.width - NODE_WIDTH).abs() < 1e-9);
    }

    #[test]
    fn test_children_split_parent_span() {
        let Some(root) = compute_layout(&build(&[10, 20, 30]), 800.0) else {
            panic!("expected a layout");
        };

        // Span [50, 750] split in two halves of 350
        assert!((root.x - 400.0).abs() < 1e-9);
        assert_eq!(root.children.len(), 2);
        assert!((root.children[0].x - 225.0).abs() < 1e-9);
        assert!((root.children[1].x - 575.0).abs() < 1e-9);
        for child in &root.children {
            assert!((child.y - 160.0).abs() < 1e-9);
            assert_eq!(child.depth, 1);
        }
    }

    #[test]
    fn test_edges_and_leaf_chain() {
        let tree = build(&[10, 20, 30, 40, 50]);
        let Some(root) = compute_layout(&tree, 1000.0) else {
            panic!("expected a layout");
        };

        assert_eq!(root.nodes().len(), 4);
        assert_eq!(root.edges().len(), 3);

        let leaf_keys: Vec<Vec<Key>> = root.leaves().iter().map(|l| l.keys.clone()).collect();
        assert_eq!(leaf_keys, vec![vec![10], vec![30], vec![50]]);

        let chain = root.leaf_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].to, chain[1].from);
        assert!(root.find(chain[0].from).is_some_and(|n| n.is_leaf));
    }

    #[test]
    fn test_node_width_grows_with_keys() {
        assert!((node_width(1) - NODE_WIDTH).abs() < 1e-9);
        assert!((node_width(4) - 180.0).abs() < 1e-9);
    }
}
