use std::fmt;
use std::sync::Arc;

use availarr_core::scheduler::RunTracker;
use availarr_core::service::{AvailabilityService, TaskRunners};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AvailabilityService>,
    pub runners: TaskRunners,
    /// Single-flight flag for scans restricted to some sources, which run
    /// outside the scheduled runners.
    pub targeted_scan: Arc<RunTracker>,
    /// Cancelled on shutdown; manual runs observe it like scheduled ones.
    pub shutdown: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        service: Arc<AvailabilityService>,
        runners: TaskRunners,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            runners,
            targeted_scan: Arc::new(RunTracker::default()),
            shutdown,
            started_at: Utc::now(),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
