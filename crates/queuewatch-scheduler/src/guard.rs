//! Single-flight guard around a check body

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use crate::job::Job;

/// Result of attempting to run a job under the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job ran and returned `Ok`
    Completed,
    /// The job ran and returned an error (already logged)
    Failed,
    /// Another run held the guard, so this one was dropped
    Skipped,
}

/// Non-blocking mutual exclusion for check bodies.
///
/// At most one holder at a time. A caller that finds the guard taken does
/// not wait: its request is dropped. Every path that executes a check
/// (timer, on-demand trigger, one-shot CLI run) goes through the same guard.
#[derive(Debug, Default)]
pub struct CheckGuard {
    running: AtomicBool,
}

/// Held while a check body executes; releases the guard on drop
#[derive(Debug)]
pub struct GuardPermit<'a> {
    running: &'a AtomicBool,
}

impl Drop for GuardPermit<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl CheckGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a check currently holds the guard
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Take the guard if it is free
    pub fn try_enter(&self) -> Option<GuardPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardPermit {
                running: &self.running,
            })
    }

    /// Run `job` if no other check is in flight.
    ///
    /// Errors from the job are caught and logged here; they never propagate
    /// to the caller.
    pub async fn try_run(&self, job: &dyn Job) -> RunOutcome {
        let Some(_permit) = self.try_enter() else {
            debug!("Check '{}' already in progress, skipping", job.name());
            return RunOutcome::Skipped;
        };

        match job.run().await {
            Ok(()) => RunOutcome::Completed,
            Err(e) => {
                error!("Check '{}' failed: {:#}", job.name(), e);
                RunOutcome::Failed
            }
        }
    }
}
