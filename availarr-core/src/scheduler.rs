//! Interval-driven background tasks.
//!
//! Each task owns a [`RunTracker`]: a tick (or a manual trigger) that lands
//! while the previous run is still going is rejected with
//! [`TaskError::AlreadyRunning`]. Different tasks never block each other.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use availarr_model::{SafetyNetSummary, ScanResult};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AvailarrError;
use crate::safety_net::SafetyNetJob;
use crate::scan::ScanOrchestrator;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task {0} is already running")]
    AlreadyRunning(&'static str),
    #[error("task {task} failed: {source}")]
    Failed {
        task: &'static str,
        #[source]
        source: AvailarrError,
    },
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Scan(ScanResult),
    SafetyNet(SafetyNetSummary),
}

#[async_trait]
pub trait ScheduledTask: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn run(&self, cancel: &CancellationToken) -> Result<TaskOutcome, AvailarrError>;
}

/// Single-flight flag for one task.
#[derive(Debug, Default)]
pub struct RunTracker {
    running: AtomicBool,
}

impl RunTracker {
    pub fn try_start(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { tracker: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the running flag on drop, including when the run panics.
#[derive(Debug)]
pub struct RunGuard<'a> {
    tracker: &'a RunTracker,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.tracker.running.store(false, Ordering::Release);
    }
}

/// Runs one task on its interval and on demand.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    task: Arc<dyn ScheduledTask>,
    tracker: Arc<RunTracker>,
}

impl TaskRunner {
    pub fn new(task: Arc<dyn ScheduledTask>) -> Self {
        Self {
            task,
            tracker: Arc::new(RunTracker::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    pub fn is_running(&self) -> bool {
        self.tracker.is_running()
    }

    /// Runs the task now unless a run is already in flight.
    pub async fn trigger(&self, cancel: &CancellationToken) -> Result<TaskOutcome, TaskError> {
        let name = self.task.name();
        let Some(_guard) = self.tracker.try_start() else {
            return Err(TaskError::AlreadyRunning(name));
        };
        debug!(task = name, "task started");
        self.task
            .run(cancel)
            .await
            .map_err(|source| TaskError::Failed { task: name, source })
    }

    /// Spawns the interval loop. The first tick fires immediately.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.task.name();
            let period = self.task.interval();
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(task = name, interval = ?period, "scheduled task registered");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(task = name, "scheduled task stopping");
                        break;
                    }
                    _ = timer.tick() => {}
                }
                match self.trigger(&shutdown).await {
                    Ok(_) => debug!(task = name, "scheduled run finished"),
                    Err(TaskError::AlreadyRunning(_)) => {
                        warn!(task = name, "previous run still in progress; tick skipped")
                    }
                    Err(err) => error!(task = name, error = %err, "scheduled run failed"),
                }
            }
        })
    }
}

#[derive(Debug)]
pub struct ScanTask {
    orchestrator: Arc<ScanOrchestrator>,
    incremental: bool,
    interval: Duration,
}

impl ScanTask {
    pub fn full(orchestrator: Arc<ScanOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            incremental: false,
            interval,
        }
    }

    pub fn incremental(orchestrator: Arc<ScanOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            incremental: true,
            interval,
        }
    }
}

#[async_trait]
impl ScheduledTask for ScanTask {
    fn name(&self) -> &'static str {
        if self.incremental {
            "incremental_scan"
        } else {
            "full_scan"
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<TaskOutcome, AvailarrError> {
        self.orchestrator
            .scan(&[], self.incremental, cancel)
            .await
            .map(TaskOutcome::Scan)
    }
}

#[derive(Debug)]
pub struct SafetyNetTask {
    job: Arc<SafetyNetJob>,
    interval: Duration,
}

impl SafetyNetTask {
    pub fn new(job: Arc<SafetyNetJob>, interval: Duration) -> Self {
        Self { job, interval }
    }
}

#[async_trait]
impl ScheduledTask for SafetyNetTask {
    fn name(&self) -> &'static str {
        "safety_net"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<TaskOutcome, AvailarrError> {
        self.job.run_pass(cancel).await.map(TaskOutcome::SafetyNet)
    }
}
