//! queuewatch-scheduler - Single-flight polling for watch checks
//!
//! This crate provides functionality for:
//! - Running a check on a fixed delay from a single worker task
//! - Accepting on-demand "check now" requests on the same worker
//! - Re-arming the timer when the polling interval changes
//! - Guaranteeing that check bodies never overlap

pub mod guard;
pub mod job;
pub mod runner;

pub use guard::{CheckGuard, GuardPermit, RunOutcome};
pub use job::Job;
pub use runner::{MIN_INTERVAL, Scheduler, SchedulerState, TriggerOutcome};
