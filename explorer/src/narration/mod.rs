//! Step-by-step narration of tree operations.
//!
//! Tree logic never waits on the presentation. An operation produces a
//! [`Narration`], a restartable lazy sequence of [`VisualizationStep`]s, and
//! a [`Player`] paces those steps at whatever speed the viewer picked.

mod player;
mod steps;

pub use player::{Player, Speed};
pub use steps::{
    MUTATION_STEP_DELAY, Narration, OperationKind, SEARCH_RESULT_DELAY, SEARCH_VISIT_DELAY,
    SPLIT_DELAY, StepKind, Steps, VisualizationStep,
};
