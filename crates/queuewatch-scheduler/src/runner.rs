//! Fixed-delay polling worker with on-demand triggers

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::guard::CheckGuard;
use crate::job::Job;

/// Shortest interval the scheduler will arm
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Whether a check is executing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What happened to an on-demand check request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The worker will run a check shortly
    Accepted,
    /// A check is in flight or already pending; the request was discarded
    Dropped,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Manual,
    Timer,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => write!(f, "on-demand"),
            Trigger::Timer => write!(f, "scheduled"),
        }
    }
}

/// Pending timer for the next scheduled run
#[derive(Debug, Default)]
struct Timer {
    due: Option<Instant>,
}

impl Timer {
    fn cancel(&mut self) {
        self.due = None;
    }

    fn arm(&mut self, at: Instant) {
        self.due = Some(at);
    }

    fn rearm(&mut self, interval: Duration) {
        self.cancel();
        self.arm(Instant::now() + interval);
    }

    async fn expired(&self) {
        match self.due {
            Some(due) => tokio::time::sleep_until(due).await,
            None => std::future::pending().await,
        }
    }
}

/// Runs a [`Job`] on a single worker task.
///
/// The first check runs as soon as the scheduler starts; after that each
/// check is due `interval` after the previous one finished. On-demand
/// requests share the same worker and the same [`CheckGuard`], so checks
/// never overlap: a request that arrives while a check is running is
/// dropped rather than queued.
pub struct Scheduler {
    guard: Arc<CheckGuard>,
    trigger_tx: mpsc::Sender<Trigger>,
    interval_tx: watch::Sender<Duration>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the worker and run the first check immediately
    pub fn start(job: Arc<dyn Job>, interval: Duration) -> Self {
        Self::start_with_guard(job, interval, Arc::new(CheckGuard::new()))
    }

    /// Like [`Scheduler::start`], sharing an existing guard with other callers
    pub fn start_with_guard(job: Arc<dyn Job>, interval: Duration, guard: Arc<CheckGuard>) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        // Capacity 1: one pending request is enough, extras are dropped
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (interval_tx, interval_rx) = watch::channel(interval);
        let cancel = CancellationToken::new();

        info!(
            "Starting scheduler for '{}' with interval {:?}",
            job.name(),
            interval
        );

        let worker = tokio::spawn(worker_loop(
            job,
            guard.clone(),
            trigger_rx,
            interval_rx,
            cancel.clone(),
        ));

        Self {
            guard,
            trigger_tx,
            interval_tx,
            cancel,
            worker,
        }
    }

    /// Request an immediate check
    pub fn check_now(&self) -> TriggerOutcome {
        if self.guard.is_running() {
            info!("Check already in progress, dropping on-demand request");
            return TriggerOutcome::Dropped;
        }

        match self.trigger_tx.try_send(Trigger::Manual) {
            Ok(()) => TriggerOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("A check is already pending, dropping on-demand request");
                TriggerOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Scheduler worker has stopped, dropping on-demand request");
                TriggerOutcome::Dropped
            }
        }
    }

    /// Replace the polling interval.
    ///
    /// Any pending scheduled run is cancelled and re-armed `interval` from
    /// now. A check already in flight finishes untouched; the new interval
    /// applies from its completion.
    pub fn set_interval(&self, interval: Duration) {
        let interval = interval.max(MIN_INTERVAL);
        let previous = self.interval_tx.send_replace(interval);
        if previous != interval {
            info!("Polling interval changed: {:?} -> {:?}", previous, interval);
        }
    }

    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    pub fn state(&self) -> SchedulerState {
        if self.guard.is_running() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// The guard every check body runs under
    pub fn guard(&self) -> Arc<CheckGuard> {
        self.guard.clone()
    }

    /// Stop the worker, letting an in-flight check finish first
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            warn!("Scheduler worker ended abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }
}

async fn worker_loop(
    job: Arc<dyn Job>,
    guard: Arc<CheckGuard>,
    mut trigger_rx: mpsc::Receiver<Trigger>,
    mut interval_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
) {
    let mut timer = Timer::default();
    timer.arm(Instant::now());

    loop {
        let trigger = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let interval = *interval_rx.borrow_and_update();
                timer.rearm(interval);
                debug!("Re-armed next check in {:?}", interval);
                continue;
            }
            received = trigger_rx.recv() => match received {
                Some(trigger) => trigger,
                None => break,
            },
            _ = timer.expired() => Trigger::Timer,
        };

        timer.cancel();
        debug!("Running {} check '{}'", trigger, job.name());
        guard.try_run(job.as_ref()).await;

        let mut dropped = 0;
        while trigger_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} check request(s) received mid-check", dropped);
        }

        let interval = *interval_rx.borrow_and_update();
        timer.rearm(interval);
    }

    debug!("Scheduler worker for '{}' exiting", job.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records when each run started and takes `work` to finish
    struct RecordingJob {
        work: Duration,
        fail: bool,
        starts: Mutex<Vec<Instant>>,
        runs: AtomicUsize,
    }

    impl RecordingJob {
        fn new(work: Duration) -> Arc<Self> {
            Arc::new(Self {
                work,
                fail: false,
                starts: Mutex::new(Vec::new()),
                runs: AtomicUsize::new(0),
            })
        }

        fn failing(work: Duration) -> Arc<Self> {
            Arc::new(Self {
                work,
                fail: true,
                starts: Mutex::new(Vec::new()),
                runs: AtomicUsize::new(0),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for RecordingJob {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run(&self) -> Result<()> {
            self.starts.lock().unwrap().push(Instant::now());
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            if self.fail {
                return Err(anyhow!("simulated failure"));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_check_runs_immediately() {
        let job = RecordingJob::new(Duration::ZERO);
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_checks() {
        let job = RecordingJob::new(Duration::from_secs(10));
        let origin = Instant::now();
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(150)).await;

        let offsets: Vec<u64> = job
            .starts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 70, 140]);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_now_dropped_while_running() {
        let job = RecordingJob::new(Duration::from_secs(30));
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.check_now(), TriggerOutcome::Dropped);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(job.runs(), 1);

        assert_eq!(scheduler.check_now(), TriggerOutcome::Accepted);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pending_request_is_dropped() {
        let job = RecordingJob::new(Duration::ZERO);
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(scheduler.check_now(), TriggerOutcome::Accepted);
        assert_eq!(scheduler.check_now(), TriggerOutcome::Dropped);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_rearms_pending_timer() {
        let job = RecordingJob::new(Duration::ZERO);
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs(), 1);

        scheduler.set_interval(Duration::from_secs(60));
        assert_eq!(scheduler.interval(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(job.runs(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_during_check_applies_after_it() {
        let job = RecordingJob::new(Duration::from_secs(20));
        let origin = Instant::now();
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(5)).await;
        scheduler.set_interval(Duration::from_secs(30));

        // First check ends at 20s, next one is due 30s later
        tokio::time::sleep(Duration::from_secs(50)).await;
        let offsets: Vec<u64> = job
            .starts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 50]);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_worker() {
        let job = RecordingJob::failing(Duration::ZERO);
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(job.runs(), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_clamped() {
        let job = RecordingJob::new(Duration::ZERO);
        let scheduler = Scheduler::start(job.clone(), Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_check() {
        let job = RecordingJob::new(Duration::from_secs(30));
        let scheduler = Scheduler::start(job.clone(), Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let guard = scheduler.guard();
        scheduler.shutdown().await;
        assert!(!guard.is_running());
        assert_eq!(job.runs(), 1);
    }
}
