use std::fmt;

use async_trait::async_trait;
use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, CanonicalId, MediaKind,
    MediaRequest, RequestId, RequestStatus, SeasonRecord, SourceId, Tier,
};
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Availability records and their seasons.
#[async_trait]
pub trait StatusStore: Send + Sync + fmt::Debug {
    async fn load(&self, kind: MediaKind, id: CanonicalId) -> Result<Option<AvailabilityView>>;

    /// Writes a record and all of its seasons atomically.
    async fn save(&self, record: &AvailabilityRecord, seasons: &[SeasonRecord]) -> Result<()>;

    /// Records whose standard or high-tier status equals `status`.
    async fn list_by_status(&self, status: AvailabilityStatus) -> Result<Vec<AvailabilityRecord>>;

    /// Administrative deletion. Returns false when no record exists.
    async fn mark_deleted(&self, kind: MediaKind, id: CanonicalId) -> Result<bool>;
}

#[async_trait]
pub trait RequestLedger: Send + Sync + fmt::Debug {
    /// Pending or processing requests for a title.
    async fn outstanding_for(&self, kind: MediaKind, id: CanonicalId) -> Result<Vec<MediaRequest>>;

    /// Moves an outstanding request to available. Returns true only for the
    /// call that performed the transition.
    async fn mark_available(&self, request: RequestId) -> Result<bool>;

    /// Returns an available request to `status` after its event was
    /// rejected. Returns false when the request is no longer available.
    async fn reopen(&self, request: RequestId, status: RequestStatus) -> Result<bool>;
}

/// Knowledge of completed downloads that have not been scanned yet.
#[async_trait]
pub trait FulfillmentCache: Send + Sync + fmt::Debug {
    async fn has_complete_file(&self, kind: MediaKind, id: CanonicalId, tier: Tier)
    -> Result<bool>;
}

#[async_trait]
pub trait ScanCheckpointStore: Send + Sync + fmt::Debug {
    async fn last_scan(&self, source: &SourceId) -> Result<Option<DateTime<Utc>>>;
    async fn record_scan(&self, source: &SourceId, at: DateTime<Utc>) -> Result<()>;
}
