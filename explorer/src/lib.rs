// Life of a request:
// 1. A line comes in on stdin
// 2. Parse it into a `Request`
// 3. For tree operations:
//     - Apply the operation to the current snapshot (simulator)
//     - Turn the result into a narration
//     - Play the narration step by step with timed pauses
//     - Signal completion, take the next request
//    For everything else:
//     - Answer from the current snapshot (stats, layout, log, check)
//
// System components:
//  - Copy-on-write B-tree
//  - Layout engine
//  - Narration and playback
//  - Simulator state machine

pub mod btree;
pub mod command;
pub mod config;
pub mod driver;
pub mod layout;
pub mod narration;
pub mod output;
pub mod simulator;
pub mod workload;

pub use driver::Driver;
pub use simulator::{Command, Simulator};
