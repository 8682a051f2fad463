//! The unit of work the scheduler drives

use anyhow::Result;
use async_trait::async_trait;

/// A check the scheduler can run.
///
/// Implementations should do all of their work inside `run` and return any
/// failure instead of panicking; the scheduler logs the error and moves on
/// to the next scheduled run.
#[async_trait]
pub trait Job: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Execute one check
    async fn run(&self) -> Result<()>;
}
