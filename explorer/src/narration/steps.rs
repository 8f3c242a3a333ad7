//! Visualization steps derived from operation results.
//!
//! A [`Narration`] keeps only what an operation did (the visited path,
//! splits, and the outcome). Steps are built on demand by [`Steps`], so a
//! narration can be replayed any number of times by calling
//! [`Narration::steps`] again.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::btree::{
    DeleteOutcome, DeleteResult, InsertOutcome, InsertResult, Key, NodeId, Rejection,
    SearchResult, SplitEvent,
};

/// Pause after highlighting a node during a search.
pub const SEARCH_VISIT_DELAY: Duration = Duration::from_millis(500);
/// Hold on the search result before the highlight clears.
pub const SEARCH_RESULT_DELAY: Duration = Duration::from_millis(1000);
/// Pause between insert and delete steps.
pub const MUTATION_STEP_DELAY: Duration = Duration::from_millis(300);
/// Pause on a split.
pub const SPLIT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Search,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Search => write!(f, "search"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Operation announced, nothing highlighted yet.
    Begin,
    /// One more node on the path is highlighted.
    Visit,
    /// A node split and promoted a key.
    Split,
    /// Search hit.
    Found,
    /// Search miss.
    NotFound,
    /// Insert or delete applied.
    Applied,
    /// Operation refused; the tree did not change.
    Rejected,
}

/// One frame of an operation's narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualizationStep {
    pub operation: OperationKind,
    pub kind: StepKind,
    /// Node drawn as current.
    pub current_node: Option<NodeId>,
    /// Nodes highlighted as the traversal so far.
    pub path: Vec<NodeId>,
    /// Key drawn as found.
    pub found_key: Option<Key>,
    pub message: String,
    /// Pause after this step at speed 1.
    #[serde(rename = "base_delay_ms", serialize_with = "serialize_millis")]
    pub base_delay: Duration,
}

fn serialize_millis<S: serde::Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Conclusion {
    kind: StepKind,
    message: String,
    found_key: Option<Key>,
    delay: Duration,
}

/// The recorded course of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    operation: OperationKind,
    key: Key,
    /// Whether the descent is shown. Operations refused up front skip it.
    animated: bool,
    path: Vec<NodeId>,
    splits: Vec<SplitEvent>,
    conclusion: Conclusion,
    /// Line for the event log.
    log_line: String,
}

impl Narration {
    #[must_use]
    pub fn search(key: Key, result: &SearchResult) -> Self {
        let (conclusion, log_line, animated) = match result.rejection() {
            None => {
                let message = format!("Found {key} at depth {}", result.depth);
                (
                    Conclusion {
                        kind: StepKind::Found,
                        message: message.clone(),
                        found_key: Some(key),
                        delay: SEARCH_RESULT_DELAY,
                    },
                    message,
                    true,
                )
            }
            Some(Rejection::EmptyTree) => {
                let message = "Search failed: tree is empty".to_string();
                (
                    Conclusion {
                        kind: StepKind::Rejected,
                        message: message.clone(),
                        found_key: None,
                        delay: Duration::ZERO,
                    },
                    message,
                    false,
                )
            }
            Some(_) => (
                Conclusion {
                    kind: StepKind::NotFound,
                    message: format!("{key} not found"),
                    found_key: None,
                    delay: SEARCH_RESULT_DELAY,
                },
                format!("{key} not found in tree"),
                true,
            ),
        };

        Self {
            operation: OperationKind::Search,
            key,
            animated,
            path: result.path.clone(),
            splits: Vec::new(),
            conclusion,
            log_line,
        }
    }

    #[must_use]
    pub fn insert(key: Key, result: &InsertResult) -> Self {
        let (kind, message, animated) = match result.outcome {
            InsertOutcome::Rejected(_) => (
                StepKind::Rejected,
                format!("{key} already exists in tree"),
                false,
            ),
            InsertOutcome::Inserted { new_root: true, .. } => (
                StepKind::Applied,
                format!("Inserted {key} into new root"),
                false,
            ),
            InsertOutcome::Inserted {
                root_split: true, ..
            } => (
                StepKind::Applied,
                format!("Inserted {key}, root split! New height."),
                true,
            ),
            InsertOutcome::Inserted { .. } => (StepKind::Applied, format!("Inserted {key}"), true),
        };

        Self {
            operation: OperationKind::Insert,
            key,
            animated,
            path: if animated { result.path.clone() } else { Vec::new() },
            splits: result.splits.clone(),
            conclusion: Conclusion {
                kind,
                message: message.clone(),
                found_key: None,
                delay: if animated {
                    MUTATION_STEP_DELAY
                } else {
                    Duration::ZERO
                },
            },
            log_line: message,
        }
    }

    #[must_use]
    pub fn delete(key: Key, result: &DeleteResult) -> Self {
        let (kind, message, animated) = match result.outcome {
            DeleteOutcome::Rejected(Rejection::EmptyTree) => (
                StepKind::Rejected,
                "Delete failed: tree is empty".to_string(),
                false,
            ),
            DeleteOutcome::Rejected(_) => (StepKind::Rejected, format!("{key} not found"), true),
            DeleteOutcome::Deleted { emptied: true, .. } => (
                StepKind::Applied,
                format!("Deleted {key}, tree is now empty"),
                true,
            ),
            DeleteOutcome::Deleted {
                height_decreased: true,
                ..
            } => (
                StepKind::Applied,
                format!("Deleted {key}, tree height decreased"),
                true,
            ),
            DeleteOutcome::Deleted {
                predecessor: Some(predecessor),
                ..
            } => (
                StepKind::Applied,
                format!("Deleted {key}, replaced by predecessor {predecessor}"),
                true,
            ),
            DeleteOutcome::Deleted { .. } => (StepKind::Applied, format!("Deleted {key}"), true),
        };

        Self {
            operation: OperationKind::Delete,
            key,
            animated,
            path: result.path.clone(),
            splits: Vec::new(),
            conclusion: Conclusion {
                kind,
                message: message.clone(),
                found_key: None,
                delay: if animated {
                    MUTATION_STEP_DELAY
                } else {
                    Duration::ZERO
                },
            },
            log_line: message,
        }
    }

    #[must_use]
    pub const fn operation(&self) -> OperationKind {
        self.operation
    }

    #[must_use]
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Line recorded in the event log for this operation.
    #[must_use]
    pub fn log_line(&self) -> &str {
        &self.log_line
    }

    /// Whether the operation changed nothing.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.conclusion.kind == StepKind::Rejected
    }

    /// Number of steps [`Self::steps`] yields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prelude_len() + self.splits.len() + 1
    }

    /// Never true: every narration ends with a concluding step.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Start (or restart) the step sequence.
    #[must_use]
    pub const fn steps(&self) -> Steps<'_> {
        Steps {
            narration: self,
            cursor: 0,
        }
    }

    const fn prelude_len(&self) -> usize {
        if self.animated {
            1 + self.path.len()
        } else {
            0
        }
    }

    fn visit_delay(&self) -> Duration {
        match self.operation {
            OperationKind::Search => SEARCH_VISIT_DELAY,
            OperationKind::Insert | OperationKind::Delete => MUTATION_STEP_DELAY,
        }
    }

    fn step(&self, index: usize) -> Option<VisualizationStep> {
        let prelude = self.prelude_len();
        let splits_end = prelude + self.splits.len();

        let step = if index == 0 && self.animated {
            let verb = match self.operation {
                OperationKind::Insert => "Inserting",
                OperationKind::Search => "Searching for",
                OperationKind::Delete => "Deleting",
            };
            VisualizationStep {
                operation: self.operation,
                kind: StepKind::Begin,
                current_node: None,
                path: Vec::new(),
                found_key: None,
                message: format!("{verb} {}...", self.key),
                base_delay: Duration::ZERO,
            }
        } else if index < prelude {
            let visited = &self.path[..index];
            let current = visited.last().copied();
            VisualizationStep {
                operation: self.operation,
                kind: StepKind::Visit,
                current_node: current,
                path: visited.to_vec(),
                found_key: None,
                message: current.map(|id| format!("Visiting {id}")).unwrap_or_default(),
                base_delay: self.visit_delay(),
            }
        } else if index < splits_end {
            let split = &self.splits[index - prelude];
            VisualizationStep {
                operation: self.operation,
                kind: StepKind::Split,
                current_node: Some(split.node),
                path: self.path.clone(),
                found_key: None,
                message: format!(
                    "Split {} at depth {}: promoted {}, new node {}",
                    split.node, split.depth, split.promoted, split.right
                ),
                base_delay: SPLIT_DELAY,
            }
        } else if index == splits_end {
            VisualizationStep {
                operation: self.operation,
                kind: self.conclusion.kind,
                current_node: self.path.last().copied(),
                path: self.path.clone(),
                found_key: self.conclusion.found_key,
                message: self.conclusion.message.clone(),
                base_delay: self.conclusion.delay,
            }
        } else {
            return None;
        };
        Some(step)
    }
}

/// Lazy iterator over a narration's steps.
#[derive(Debug, Clone)]
pub struct Steps<'a> {
    narration: &'a Narration,
    cursor: usize,
}

impl Iterator for Steps<'_> {
    type Item = VisualizationStep;

    fn next(&mut self) -> Option<Self::Item> {
        let step = self.narration.step(self.cursor)?;
        self.cursor += 1;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.narration.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Steps<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::{DeletePolicy, Order, Tree};

    fn scenario_tree() -> Tree {
        [10, 20, 30]
            .into_iter()
            .fold(Tree::new(Order::DEFAULT), |tree, key| tree.insert(key).tree)
    }

    #[test]
    fn test_search_hit_steps() {
        let tree = scenario_tree();
        let narration = Narration::search(30, &tree.search(30));
        let steps: Vec<VisualizationStep> = narration.steps().collect();

        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Begin,
                StepKind::Visit,
                StepKind::Visit,
                StepKind::Found
            ]
        );
        assert_eq!(steps[0].message, "Searching for 30...");
        assert_eq!(steps[1].path.len(), 1);
        assert_eq!(steps[2].path.len(), 2);
        assert_eq!(steps[2].base_delay, SEARCH_VISIT_DELAY);
        assert_eq!(steps[3].found_key, Some(30));
        assert_eq!(steps[3].message, "Found 30 at depth 1");
        assert_eq!(steps[3].base_delay, SEARCH_RESULT_DELAY);
        assert_eq!(narration.log_line(), "Found 30 at depth 1");
    }

    #[test]
    fn test_steps_restart() {
        let tree = scenario_tree();
        let narration = Narration::search(99, &tree.search(99));

        let first: Vec<VisualizationStep> = narration.steps().collect();
        let second: Vec<VisualizationStep> = narration.steps().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), narration.len());
        assert_eq!(narration.steps().len(), narration.len());
        assert_eq!(narration.log_line(), "99 not found in tree");
        assert_eq!(narration.operation(), OperationKind::Search);
        assert_eq!(narration.key(), 99);
    }

    #[test]
    fn test_search_empty_tree_is_single_step() {
        let narration = Narration::search(1, &Tree::new(Order::DEFAULT).search(1));
        let steps: Vec<VisualizationStep> = narration.steps().collect();

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, StepKind::Rejected);
        assert_eq!(steps[0].message, "Search failed: tree is empty");
        assert!(narration.is_rejected());
    }

    #[test]
    fn test_insert_split_steps() {
        let tree = [10, 20]
            .into_iter()
            .fold(Tree::new(Order::DEFAULT), |tree, key| tree.insert(key).tree);
        let result = tree.insert(30);
        let narration = Narration::insert(30, &result);
        let steps: Vec<VisualizationStep> = narration.steps().collect();

        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Begin,
                StepKind::Visit,
                StepKind::Split,
                StepKind::Applied
            ]
        );
        assert_eq!(steps[2].current_node, Some(NodeId(1)));
        assert_eq!(
            steps[2].message,
            "Split node-1 at depth 0: promoted 20, new node node-2"
        );
        assert_eq!(narration.log_line(), "Inserted 30, root split! New height.");
    }

    #[test]
    fn test_duplicate_insert_is_not_animated() {
        let tree = scenario_tree();
        let narration = Narration::insert(20, &tree.insert(20));

        assert_eq!(narration.len(), 1);
        assert!(narration.is_rejected());
        assert_eq!(narration.log_line(), "20 already exists in tree");
    }

    #[test]
    fn test_delete_messages() {
        let tree = scenario_tree();

        let collapsed = Narration::delete(20, &tree.delete(20, DeletePolicy::Simplified));
        assert_eq!(collapsed.log_line(), "Deleted 20, tree height decreased");
        assert!(!collapsed.is_rejected());

        let missing = Narration::delete(5, &tree.delete(5, DeletePolicy::Simplified));
        assert_eq!(missing.log_line(), "5 not found");
        assert!(missing.is_rejected());
        assert_eq!(missing.steps().next().map(|s| s.kind), Some(StepKind::Begin));

        let empty = Tree::new(Order::DEFAULT);
        let refused = Narration::delete(5, &empty.delete(5, DeletePolicy::Simplified));
        assert_eq!(refused.log_line(), "Delete failed: tree is empty");
        assert_eq!(refused.len(), 1);
    }

    #[test]
    fn test_step_serializes_delay_in_millis() {
        let tree = scenario_tree();
        let narration = Narration::search(20, &tree.search(20));
        let Some(last) = narration.steps().last() else {
            panic!("narration should have steps");
        };

        let json = serde_json::to_value(&last).unwrap_or_default();
        assert_eq!(json["kind"], "found");
        assert_eq!(json["base_delay_ms"], 1000);
        assert_eq!(json["current_node"], "node-3");
    }
}
