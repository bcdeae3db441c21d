//! Facade over the engine for the server and other platform components.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use availarr_model::{
    AvailabilityView, CanonicalId, MediaKind, SafetyNetSummary, ScanResult, SourceId,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::AvailabilityEventSink;
use crate::identity::{IdentityCache, IdentityResolver};
use crate::persistence::{FulfillmentCache, RequestLedger, ScanCheckpointStore, StatusStore};
use crate::providers::CatalogLookup;
use crate::reconcile::Reconciler;
use crate::safety_net::SafetyNetJob;
use crate::scan::ScanOrchestrator;
use crate::scheduler::{SafetyNetTask, ScanTask, TaskRunner};
use crate::sources::SourceCatalog;

/// Collaborators the engine is built from.
#[derive(Clone)]
pub struct EngineParts {
    pub sources: Arc<dyn SourceCatalog>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub identity_cache: Arc<dyn IdentityCache>,
    pub store: Arc<dyn StatusStore>,
    pub requests: Arc<dyn RequestLedger>,
    pub fulfillment: Arc<dyn FulfillmentCache>,
    pub checkpoints: Arc<dyn ScanCheckpointStore>,
    pub events: Arc<dyn AvailabilityEventSink>,
}

impl fmt::Debug for EngineParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineParts")
            .field("sources", &self.sources)
            .field("store", &self.store)
            .field("requests", &self.requests)
            .field("fulfillment", &self.fulfillment)
            .finish_non_exhaustive()
    }
}

/// Intervals for the three background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub full_scan: Duration,
    pub incremental_scan: Duration,
    pub safety_net: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            full_scan: Duration::from_secs(24 * 60 * 60),
            incremental_scan: Duration::from_secs(5 * 60),
            safety_net: Duration::from_secs(6 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityService {
    store: Arc<dyn StatusStore>,
    reconciler: Arc<Reconciler>,
    orchestrator: Arc<ScanOrchestrator>,
    safety_net: Arc<SafetyNetJob>,
}

impl AvailabilityService {
    pub fn new(parts: EngineParts, config: EngineConfig) -> Self {
        let config = config.normalized();
        let reconciler = Arc::new(Reconciler::new(
            parts.store.clone(),
            parts.requests,
            parts.events,
        ));
        let resolver = Arc::new(IdentityResolver::new(
            parts.catalog.clone(),
            parts.identity_cache,
            config.request_timeout(),
        ));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            parts.sources.clone(),
            resolver,
            parts.catalog.clone(),
            reconciler.clone(),
            parts.checkpoints,
            config.clone(),
        ));
        let safety_net = Arc::new(SafetyNetJob::new(
            parts.store.clone(),
            parts.fulfillment,
            parts.sources,
            parts.catalog,
            reconciler.clone(),
            config,
        ));
        Self {
            store: parts.store,
            reconciler,
            orchestrator,
            safety_net,
        }
    }

    /// Full or incremental scan of `source_ids`; empty means every enabled
    /// source.
    pub async fn scan(
        &self,
        source_ids: &[SourceId],
        incremental: bool,
        cancel: &CancellationToken,
    ) -> Result<ScanResult> {
        self.orchestrator.scan(source_ids, incremental, cancel).await
    }

    pub async fn run_safety_net_pass(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SafetyNetSummary> {
        self.safety_net.run_pass(cancel).await
    }

    pub async fn status(
        &self,
        kind: MediaKind,
        id: CanonicalId,
    ) -> Result<Option<AvailabilityView>> {
        self.store.load(kind, id).await
    }

    /// Administrative deletion. Later observations leave the record alone.
    pub async fn mark_deleted(&self, kind: MediaKind, id: CanonicalId) -> Result<bool> {
        let _lock = self.reconciler.lock(kind, id).await;
        let deleted = self.store.mark_deleted(kind, id).await?;
        if deleted {
            info!(key = %kind.lock_key(id), "availability record marked deleted");
        }
        Ok(deleted)
    }

    pub fn runners(&self, schedule: Schedule) -> TaskRunners {
        TaskRunners {
            incremental_scan: TaskRunner::new(Arc::new(ScanTask::incremental(
                self.orchestrator.clone(),
                schedule.incremental_scan,
            ))),
            full_scan: TaskRunner::new(Arc::new(ScanTask::full(
                self.orchestrator.clone(),
                schedule.full_scan,
            ))),
            safety_net: TaskRunner::new(Arc::new(SafetyNetTask::new(
                self.safety_net.clone(),
                schedule.safety_net,
            ))),
        }
    }
}

/// The three background tasks. Manual triggers go through the same runner
/// as the interval loop, so they share its overlap protection.
#[derive(Debug, Clone)]
pub struct TaskRunners {
    pub incremental_scan: TaskRunner,
    pub full_scan: TaskRunner,
    pub safety_net: TaskRunner,
}

impl TaskRunners {
    pub fn spawn_all(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        [&self.incremental_scan, &self.full_scan, &self.safety_net]
            .into_iter()
            .map(|runner| runner.clone().spawn(shutdown.clone()))
            .collect()
    }
}
