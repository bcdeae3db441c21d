//! Process-local implementations of the storage ports.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, CanonicalId, MediaKind,
    MediaRequest, RequestId, RequestStatus, SeasonRecord, SourceId, Tier,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::ports::{FulfillmentCache, RequestLedger, ScanCheckpointStore, StatusStore};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    records: Arc<Mutex<HashMap<(MediaKind, CanonicalId), AvailabilityView>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seeds a record without counting it as a write.
    pub async fn insert(&self, view: AvailabilityView) {
        self.records
            .lock()
            .await
            .insert((view.record.kind, view.record.canonical_id), view);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Every stored view, ordered by kind then canonical id.
    pub async fn snapshot(&self) -> Vec<AvailabilityView> {
        let mut views: Vec<AvailabilityView> =
            self.records.lock().await.values().cloned().collect();
        views.sort_by_key(|v| (v.record.kind.as_str(), v.record.canonical_id.get()));
        views
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn load(&self, kind: MediaKind, id: CanonicalId) -> Result<Option<AvailabilityView>> {
        Ok(self.records.lock().await.get(&(kind, id)).cloned())
    }

    async fn save(&self, record: &AvailabilityRecord, seasons: &[SeasonRecord]) -> Result<()> {
        let mut records = self.records.lock().await;
        let key = (record.kind, record.canonical_id);
        let mut merged: BTreeMap<i32, SeasonRecord> = records
            .get(&key)
            .map(|existing| {
                existing
                    .seasons
                    .iter()
                    .map(|s| (s.season_number, s.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for season in seasons {
            merged.insert(season.season_number, season.clone());
        }
        records.insert(
            key,
            AvailabilityView {
                record: record.clone(),
                seasons: merged.into_values().collect(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_by_status(&self, status: AvailabilityStatus) -> Result<Vec<AvailabilityRecord>> {
        let records = self.records.lock().await;
        let mut matching: Vec<AvailabilityRecord> = records
            .values()
            .filter(|v| v.record.status == status || v.record.status_high_tier == status)
            .map(|v| v.record.clone())
            .collect();
        matching.sort_by_key(|r| r.updated_at);
        Ok(matching)
    }

    async fn mark_deleted(&self, kind: MediaKind, id: CanonicalId) -> Result<bool> {
        let mut records = self.records.lock().await;
        let Some(view) = records.get_mut(&(kind, id)) else {
            return Ok(false);
        };
        view.record.status = AvailabilityStatus::Deleted;
        view.record.status_high_tier = AvailabilityStatus::Deleted;
        view.record.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryRequestLedger {
    requests: Arc<Mutex<BTreeMap<RequestId, MediaRequest>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryRequestLedger {
    fn default() -> Self {
        Self {
            requests: Arc::default(),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl InMemoryRequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a pending request and returns its id.
    pub async fn submit(
        &self,
        kind: MediaKind,
        canonical_id: CanonicalId,
        tier: Tier,
        seasons: Vec<i32>,
    ) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.requests.lock().await.insert(
            id,
            MediaRequest {
                id,
                canonical_id,
                kind,
                tier,
                seasons,
                status: RequestStatus::Pending,
            },
        );
        id
    }

    pub async fn get(&self, id: RequestId) -> Option<MediaRequest> {
        self.requests.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl RequestLedger for InMemoryRequestLedger {
    async fn outstanding_for(&self, kind: MediaKind, id: CanonicalId) -> Result<Vec<MediaRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.kind == kind && r.canonical_id == id && r.status.is_outstanding())
            .cloned()
            .collect())
    }

    async fn mark_available(&self, request: RequestId) -> Result<bool> {
        let mut requests = self.requests.lock().await;
        match requests.get_mut(&request) {
            Some(r) if r.status.is_outstanding() => {
                r.status = RequestStatus::Available;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reopen(&self, request: RequestId, status: RequestStatus) -> Result<bool> {
        let mut requests = self.requests.lock().await;
        match requests.get_mut(&request) {
            Some(r) if r.status == RequestStatus::Available => {
                r.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfillmentCache {
    complete: Arc<Mutex<HashSet<(MediaKind, CanonicalId, Tier)>>>,
}

impl InMemoryFulfillmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_complete(&self, kind: MediaKind, id: CanonicalId, tier: Tier) {
        self.complete.lock().await.insert((kind, id, tier));
    }
}

#[async_trait]
impl FulfillmentCache for InMemoryFulfillmentCache {
    async fn has_complete_file(
        &self,
        kind: MediaKind,
        id: CanonicalId,
        tier: Tier,
    ) -> Result<bool> {
        Ok(self.complete.lock().await.contains(&(kind, id, tier)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<SourceId, DateTime<Utc>>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanCheckpointStore for InMemoryCheckpointStore {
    async fn last_scan(&self, source: &SourceId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.checkpoints.lock().await.get(source).copied())
    }

    async fn record_scan(&self, source: &SourceId, at: DateTime<Utc>) -> Result<()> {
        self.checkpoints.lock().await.insert(source.clone(), at);
        Ok(())
    }
}
