//! Summary numbers shown next to the tree.

use serde::Serialize;

use crate::btree::node::Node;
use crate::btree::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeStats {
    pub height: usize,
    pub total_keys: usize,
    pub total_nodes: usize,
    /// Stored keys as a percentage of `total_nodes * max_keys`.
    pub fill_ratio: f64,
    pub max_keys_per_node: usize,
}

impl TreeStats {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of(tree: &Tree) -> Self {
        fn walk(node: &Node, keys: &mut usize, nodes: &mut usize) {
            *keys += node.key_count();
            *nodes += 1;
            for child in node.children() {
                walk(child, keys, nodes);
            }
        }

        let max_keys = tree.order().max_keys();
        let (mut total_keys, mut total_nodes) = (0, 0);
        if let Some(root) = tree.root() {
            walk(root, &mut total_keys, &mut total_nodes);
        }

        let fill_ratio = if total_nodes == 0 {
            0.0
        } else {
            total_keys as f64 / (total_nodes * max_keys) as f64 * 100.0
        };

        Self {
            height: tree.height(),
            total_keys,
            total_nodes,
            fill_ratio,
            max_keys_per_node: max_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::Order;

    #[test]
    fn test_empty_stats() {
        let stats = TreeStats::of(&Tree::new(Order::DEFAULT));
        assert_eq!(stats.height, 0);
        assert_eq!(stats.total_nodes, 0);
        assert!(stats.fill_ratio.abs() < f64::EPSILON);
        assert_eq!(stats.max_keys_per_node, 2);
    }

    #[test]
    fn test_stats_after_root_split() {
        let tree = [10, 20, 30]
            .into_iter()
            .fold(Tree::new(Order::DEFAULT), |tree, key| tree.insert(key).tree);
        let stats = TreeStats::of(&tree);

        assert_eq!(stats.height, 2);
        assert_eq!(stats.total_keys, 3);
        assert_eq!(stats.total_nodes, 3);
        assert!((stats.fill_ratio - 50.0).abs() < 1e-9);
    }
}
