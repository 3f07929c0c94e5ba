//! Scheduling engine over rounded bucket profiles.
//!
//! Decides the minimum number of machines for a profile by squaring
//! configuration tables up a ladder of halving anchors, and reconstructs the
//! per-machine configurations by backtracking the same ladder.

mod backtrace;
mod cleanup;
mod core;
mod levels;

pub use backtrace::Target;
pub use cleanup::remove_replacement_columns;
pub use core::{EngineError, SchedulingEngine, INFEASIBLE};
pub use levels::Level;
