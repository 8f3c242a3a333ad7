//! The simulator state machine.
//!
//! A [`Simulator`] owns the current tree snapshot and serializes operations
//! on it. An operation is applied as soon as it starts; the simulator then
//! stays [`OperationState::Running`] until the presentation layer calls
//! [`Simulator::complete`] after playing the narration. Starting another
//! operation in between is refused.
//!
//! # Invariants
//!
//! - At most one operation is running at a time
//! - The event log holds at most [`EVENT_LOG_CAPACITY`] entries, newest first
//! - Changing the order or resetting always leaves an empty tree

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::btree::{DeletePolicy, InvariantViolation, Key, Order, Tree, TreeStats, check_tree};
use crate::layout::{PositionedNode, compute_layout};
use crate::narration::Narration;

/// Number of entries kept in the event log.
pub const EVENT_LOG_CAPACITY: usize = 50;

/// A tree operation requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "key", rename_all = "snake_case")]
pub enum Command {
    Insert(Key),
    Search(Key),
    Delete(Key),
}

impl Command {
    /// Whether the command can change the tree.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Search(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert(key) => write!(f, "insert {key}"),
            Self::Search(key) => write!(f, "search {key}"),
            Self::Delete(key) => write!(f, "delete {key}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    /// The command is applied and its narration is playing.
    Running(Command),
}

/// Misuse of the simulator state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    /// Another operation is still running.
    Busy(Command),
    /// `complete` was called with nothing running.
    NotRunning,
    /// Requested order is below the minimum.
    InvalidOrder(usize),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(command) => write!(f, "busy: '{command}' is still running"),
            Self::NotRunning => write!(f, "no operation is running"),
            Self::InvalidOrder(order) => {
                write!(f, "invalid order {order}: must be at least {}", crate::btree::MIN_ORDER)
            }
        }
    }
}

impl std::error::Error for SimulatorError {}

/// Rolling log of human-readable events, newest first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<String>,
}

impl EventLog {
    fn push(&mut self, entry: String) {
        tracing::info!("{entry}");
        self.entries.push_front(entry);
        self.entries.truncate(EVENT_LOG_CAPACITY);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

pub struct Simulator {
    tree: Tree,
    policy: DeletePolicy,
    state: OperationState,
    log: EventLog,
}

impl Simulator {
    #[must_use]
    pub fn new(order: Order, policy: DeletePolicy) -> Self {
        let mut log = EventLog::default();
        log.push(format!("B-Tree initialized. Order: {order}"));
        Self {
            tree: Tree::new(order),
            policy,
            state: OperationState::Idle,
            log,
        }
    }

    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    #[must_use]
    pub const fn order(&self) -> Order {
        self.tree.order()
    }

    #[must_use]
    pub const fn state(&self) -> OperationState {
        self.state
    }

    #[must_use]
    pub const fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Start `command`: apply it to the tree and return its narration.
    ///
    /// The simulator stays running until [`Self::complete`] is called.
    pub fn execute(&mut self, command: Command) -> Result<Narration, SimulatorError> {
        if let OperationState::Running(running) = self.state {
            tracing::debug!("refusing '{command}' while '{running}' runs");
            return Err(SimulatorError::Busy(running));
        }

        let narration = match command {
            Command::Search(key) => Narration::search(key, &self.tree.search(key)),
            Command::Insert(key) => {
                let result = self.tree.insert(key);
                let narration = Narration::insert(key, &result);
                self.tree = result.tree;
                narration
            }
            Command::Delete(key) => {
                let result = self.tree.delete(key, self.policy);
                let narration = Narration::delete(key, &result);
                self.tree = result.tree;
                narration
            }
        };

        if command.is_mutation() && !narration.is_rejected() && cfg!(debug_assertions) {
            for violation in check_tree(&self.tree) {
                tracing::error!("invariant violated after '{command}': {violation}");
            }
        }

        self.state = OperationState::Running(command);
        self.log.push(narration.log_line().to_string());
        Ok(narration)
    }

    /// Mark the running operation as finished.
    pub fn complete(&mut self) -> Result<Command, SimulatorError> {
        match self.state {
            OperationState::Running(command) => {
                self.state = OperationState::Idle;
                tracing::debug!("'{command}' completed");
                Ok(command)
            }
            OperationState::Idle => Err(SimulatorError::NotRunning),
        }
    }

    /// Drop every key and restart node ids. Keeps the order.
    pub fn reset(&mut self) -> Result<(), SimulatorError> {
        self.ensure_idle()?;
        self.tree = Tree::new(self.tree.order());
        self.log.clear();
        self.log.push(format!("B-Tree reset. Order: {}", self.order()));
        self.log.push("Tree cleared".to_string());
        Ok(())
    }

    /// Switch to a new order. The tree is reset.
    pub fn set_order(&mut self, order: usize) -> Result<(), SimulatorError> {
        let order = Order::new(order).ok_or(SimulatorError::InvalidOrder(order))?;
        self.ensure_idle()?;
        self.tree = Tree::new(order);
        self.reset()?;
        self.log.push(format!(
            "Order changed to {order}. Max keys per node: {}",
            order.max_keys()
        ));
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> TreeStats {
        TreeStats::of(&self.tree)
    }

    #[must_use]
    pub fn layout(&self, viewport_width: f64) -> Option<PositionedNode> {
        compute_layout(&self.tree, viewport_width)
    }

    /// Run the invariant checker over the current tree.
    #[must_use]
    pub fn check(&self) -> Vec<InvariantViolation> {
        check_tree(&self.tree)
    }

    const fn ensure_idle(&self) -> Result<(), SimulatorError> {
        match self.state {
            OperationState::Running(command) => Err(SimulatorError::Busy(command)),
            OperationState::Idle => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::StepKind;

    fn simulator() -> Simulator {
        Simulator::new(Order::DEFAULT, DeletePolicy::default())
    }

    fn run(sim: &mut Simulator, command: Command) -> Narration {
        let narration = sim.execute(command).unwrap();
        sim.complete().unwrap();
        narration
    }

    #[test]
    fn test_initial_log_entry() {
        let sim = simulator();
        assert_eq!(sim.event_log().latest(), Some("B-Tree initialized. Order: 3"));
        assert_eq!(sim.state(), OperationState::Idle);
    }

    #[test]
    fn test_duplicate_insert_is_logged_noop() {
        let mut sim = simulator();
        run(&mut sim, Command::Insert(5));
        let before = sim.tree().clone();

        let narration = run(&mut sim, Command::Insert(5));

        assert!(narration.is_rejected());
        assert_eq!(sim.tree().keys(), before.keys());
        assert!(
            sim.event_log()
                .latest()
                .is_some_and(|line| line.contains("already exists"))
        );
    }

    #[test]
    fn test_overlapping_operation_is_refused() {
        let mut sim = simulator();
        sim.execute(Command::Insert(1)).unwrap();

        assert_eq!(
            sim.execute(Command::Insert(2)),
            Err(SimulatorError::Busy(Command::Insert(1)))
        );
        assert_eq!(sim.reset(), Err(SimulatorError::Busy(Command::Insert(1))));
        assert_eq!(sim.complete(), Ok(Command::Insert(1)));
        assert_eq!(sim.complete(), Err(SimulatorError::NotRunning));
        assert!(!sim.tree().contains(2));
    }

    #[test]
    fn test_operation_applied_when_started() {
        let mut sim = simulator();
        sim.execute(Command::Insert(7)).unwrap();

        assert_eq!(sim.state(), OperationState::Running(Command::Insert(7)));
        assert!(sim.tree().contains(7));
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut sim = simulator();
        for key in 0..80 {
            run(&mut sim, Command::Search(key));
        }

        assert_eq!(sim.event_log().len(), EVENT_LOG_CAPACITY);
        assert_eq!(sim.event_log().latest(), Some("Search failed: tree is empty"));
    }

    #[test]
    fn test_set_order_resets_tree() {
        let mut sim = simulator();
        for key in [10, 20, 30] {
            run(&mut sim, Command::Insert(key));
        }

        sim.set_order(5).unwrap();

        assert!(sim.tree().is_empty());
        assert_eq!(sim.order().get(), 5);
        let log: Vec<&str> = sim.event_log().iter().collect();
        assert_eq!(
            log,
            vec![
                "Order changed to 5. Max keys per node: 4",
                "Tree cleared",
                "B-Tree reset. Order: 5",
            ]
        );
        assert_eq!(sim.set_order(2), Err(SimulatorError::InvalidOrder(2)));
    }

    #[test]
    fn test_reset_restarts_node_ids() {
        let mut sim = simulator();
        for key in [10, 20, 30] {
            run(&mut sim, Command::Insert(key));
        }
        sim.reset().unwrap();
        run(&mut sim, Command::Insert(1));

        assert_eq!(sim.tree().root().map(|r| r.id().to_string()), Some("node-1".to_string()));
    }

    #[test]
    fn test_search_narration_after_inserts() {
        let mut sim = simulator();
        for key in [10, 20, 30] {
            run(&mut sim, Command::Insert(key));
        }

        let narration = run(&mut sim, Command::Search(20));
        let last = narration.steps().last().unwrap();

        assert_eq!(last.kind, StepKind::Found);
        assert_eq!(last.found_key, Some(20));
        assert!(sim.check().is_empty());
        assert_eq!(sim.stats().total_keys, 3);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SimulatorError::Busy(Command::Delete(4)).to_string(),
            "busy: 'delete 4' is still running"
        );
        assert_eq!(
            SimulatorError::InvalidOrder(1).to_string(),
            "invalid order 1: must be at least 3"
        );
    }
}
