//! P||Cmax instances and schedules, the list heuristics, and the
//! approximation driver built on the bucket engine.

mod approximation;
mod heuristic;
mod instance;

pub use approximation::{approximate, Approximation, PcmaxError};
pub use heuristic::{lpt_makespan, lpt_schedule, multifit_makespan, multifit_schedule};
pub use instance::{lower_bound, Instance, InstanceError, Schedule};
