//! Seeded random workloads.
//!
//! Drives the "random 10" request and the deterministic soak tests. The
//! same seed always produces the same sequence of keys and commands.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::btree::Key;
use crate::simulator::Command;

/// Configuration for workload generation.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Smallest generated key.
    pub key_min: Key,
    /// Largest generated key (inclusive).
    pub key_max: Key,
    /// Relative weight of inserts in `next_command`.
    pub insert_weight: u32,
    pub search_weight: u32,
    pub delete_weight: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            key_min: 1,
            key_max: 100,
            insert_weight: 3,
            search_weight: 2,
            delete_weight: 1,
        }
    }
}

/// Generator for random keys and commands.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
}

impl WorkloadGenerator {
    /// Create a generator with the default key range `1..=100`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    pub fn random_key(&mut self) -> Key {
        let (low, high) = (self.config.key_min, self.config.key_max);
        if low >= high {
            return low;
        }
        self.rng.random_range(low..=high)
    }

    /// `count` random keys. Duplicates are possible.
    pub fn random_keys(&mut self, count: usize) -> Vec<Key> {
        (0..count).map(|_| self.random_key()).collect()
    }

    /// A random command, picked by the configured weights.
    pub fn next_command(&mut self) -> Command {
        let key = self.random_key();
        let WorkloadConfig {
            insert_weight,
            search_weight,
            delete_weight,
            ..
        } = self.config;

        let total = insert_weight + search_weight + delete_weight;
        if total == 0 {
            return Command::Search(key);
        }

        let roll = self.rng.random_range(0..total);
        if roll < insert_weight {
            Command::Insert(key)
        } else if roll < insert_weight + search_weight {
            Command::Search(key)
        } else {
            Command::Delete(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::btree::{DeletePolicy, Order, check_tree};
    use crate::simulator::Simulator;

    #[test]
    fn test_workload_deterministic() {
        let mut generator1 = WorkloadGenerator::new(12345);
        let mut generator2 = WorkloadGenerator::new(12345);

        for _ in 0..100 {
            assert_eq!(generator1.next_command(), generator2.next_command());
        }
    }

    #[test]
    fn test_random_keys_in_range() {
        let mut generator = WorkloadGenerator::new(7);
        let keys = generator.random_keys(500);

        assert_eq!(keys.len(), 500);
        assert!(keys.iter().all(|k| (1..=100).contains(k)));
    }

    #[test]
    fn test_degenerate_config() {
        let config = WorkloadConfig {
            key_min: 5,
            key_max: 5,
            insert_weight: 0,
            search_weight: 0,
            delete_weight: 0,
        };
        let mut generator = WorkloadGenerator::with_config(1, config);

        assert_eq!(generator.random_key(), 5);
        assert_eq!(generator.next_command(), Command::Search(5));
    }

    /// Run a long seeded workload through the simulator and compare against a
    /// `BTreeSet` model after every operation.
    fn soak(seed: u64, order: usize, policy: DeletePolicy) {
        let config = WorkloadConfig {
            key_max: 300,
            ..WorkloadConfig::default()
        };
        let mut generator = WorkloadGenerator::with_config(seed, config);
        let mut sim = Simulator::new(Order::new(order).unwrap(), policy);
        let mut model = BTreeSet::new();

        for step in 0..3000 {
            let command = generator.next_command();
            let narration = sim.execute(command).unwrap();
            sim.complete().unwrap();

            match command {
                Command::Insert(key) => {
                    assert_eq!(model.insert(key), !narration.is_rejected());
                }
                Command::Delete(key) => {
                    assert_eq!(model.remove(&key), !narration.is_rejected());
                }
                Command::Search(key) => {
                    assert_eq!(sim.tree().contains(key), model.contains(&key));
                }
            }

            let violations = check_tree(sim.tree());
            assert!(
                violations.is_empty(),
                "seed {seed}, step {step}, '{command}': {violations:?}"
            );
            assert_eq!(sim.tree().keys(), model.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_soak_simplified() {
        for (seed, order) in [(1, 3), (2, 4), (3, 5), (4, 7)] {
            soak(seed, order, DeletePolicy::Simplified);
        }
    }

    #[test]
    fn test_soak_rebalance() {
        for (seed, order) in [(1, 3), (2, 4), (3, 5), (4, 7)] {
            soak(seed, order, DeletePolicy::Rebalance);
        }
    }
}
