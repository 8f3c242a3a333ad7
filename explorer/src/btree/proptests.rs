use std::collections::BTreeSet;

use proptest::collection::btree_set as pset;
use proptest::collection::vec as pvec;
use proptest::prelude::*;

use crate::btree::{DeletePolicy, Key, Order, Tree, check_tree};

#[derive(Debug, Clone)]
enum Operation {
    Insert(Key),
    Delete(Key),
    Search(Key),
}

// Inserts outweigh deletes so trees grow on average.
fn op_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..200i64).prop_map(Operation::Insert),
        2 => (0..200i64).prop_map(Operation::Delete),
        1 => (0..200i64).prop_map(Operation::Search),
    ]
}

fn policy_strategy() -> impl Strategy<Value = DeletePolicy> {
    prop_oneof![Just(DeletePolicy::Simplified), Just(DeletePolicy::Rebalance)]
}

fn build(order: usize, keys: impl IntoIterator<Item = Key>) -> Tree {
    let order = Order::new(order).unwrap();
    keys.into_iter()
        .fold(Tree::new(order), |tree, key| tree.insert(key).tree)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Runs random operations and validates against a std BTreeSet and the
    // invariant checker after every step.
    #[test]
    fn comprehensive(
        order in 3usize..8,
        policy in policy_strategy(),
        ops in pvec(op_strategy(), 1..400),
    ) {
        let mut tree = Tree::new(Order::new(order).unwrap());
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Operation::Insert(key) => {
                    let result = tree.insert(key);
                    prop_assert_eq!(result.outcome.is_inserted(), model.insert(key));
                    tree = result.tree;
                }
                Operation::Delete(key) => {
                    let result = tree.delete(key, policy);
                    prop_assert_eq!(result.outcome.is_deleted(), model.remove(&key));
                    tree = result.tree;
                }
                Operation::Search(key) => {
                    prop_assert_eq!(tree.search(key).found, model.contains(&key));
                }
            }

            let violations = check_tree(&tree);
            prop_assert!(violations.is_empty(), "{:?}", violations);
            prop_assert_eq!(tree.keys(), model.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn inserted_keys_are_found(order in 3usize..10, keys in pset(any::<i64>(), 0..300)) {
        let tree = build(order, keys.iter().copied());

        for key in &keys {
            let result = tree.search(*key);
            prop_assert!(result.found);
            prop_assert_eq!(result.path.len(), result.depth + 1);
        }
        prop_assert_eq!(tree.keys(), keys.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn deleted_keys_are_gone(
        order in 3usize..8,
        policy in policy_strategy(),
        keys in pset(0..500i64, 1..200),
        picks in pvec(any::<prop::sample::Index>(), 1..100),
    ) {
        let keys: Vec<Key> = keys.into_iter().collect();
        let mut tree = build(order, keys.iter().copied());
        let mut removed = BTreeSet::new();

        for pick in picks {
            let key = *pick.get(&keys);
            let result = tree.delete(key, policy);
            prop_assert_eq!(result.outcome.is_deleted(), removed.insert(key));
            tree = result.tree;
            prop_assert!(!tree.search(key).found);
        }

        for key in &keys {
            prop_assert_eq!(tree.contains(*key), !removed.contains(key));
        }
        prop_assert!(check_tree(&tree).is_empty());
    }

    #[test]
    fn rebalance_keeps_min_keys(
        order in 3usize..8,
        keys in pset(0..300i64, 1..150),
        picks in pvec(any::<prop::sample::Index>(), 1..150),
    ) {
        let keys: Vec<Key> = keys.into_iter().collect();
        let mut tree = build(order, keys.iter().copied());
        let min_keys = tree.order().min_keys();

        for pick in picks {
            tree = tree.delete(*pick.get(&keys), DeletePolicy::Rebalance).tree;

            let Some(root) = tree.root() else { continue };
            let mut stack: Vec<_> = root.children().iter().collect();
            while let Some(node) = stack.pop() {
                prop_assert!(node.key_count() >= min_keys);
                stack.extend(node.children());
            }
        }
    }

    #[test]
    fn snapshots_are_immutable(keys in pset(0..100i64, 1..60), extra in 100..200i64) {
        let tree = build(3, keys.iter().copied());
        let before = tree.keys();

        let grown = tree.insert(extra).tree;
        let shrunk = tree.delete(*keys.iter().next().unwrap(), DeletePolicy::default()).tree;

        prop_assert_eq!(tree.keys(), before);
        prop_assert!(grown.contains(extra));
        prop_assert_eq!(shrunk.keys().len(), keys.len() - 1);
    }
}
