//! Read, recompute, persist and cascade under the per-title lock.

use std::fmt;
use std::sync::Arc;

use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, CanonicalId, ContentIdentity,
    MediaAvailableEvent, MediaKind, MediaRequest, RequestStatus, SeasonRecord, Tier,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::availability::{
    ExpectedSeasons, Observation, ReconciledState, plan_reconciliation, promote_tier,
};
use crate::error::{AvailarrError, Result};
use crate::events::AvailabilityEventSink;
use crate::guard::{ContentLock, ContentLockMap};
use crate::persistence::{RequestLedger, StatusStore};

/// Result of one reconciliation step.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// Persisted state changed.
    pub changed: bool,
    /// The record is deleted and was left alone.
    pub skipped_deleted: bool,
    pub view: Option<AvailabilityView>,
    /// Requests that transitioned; publish after releasing the lock.
    pub pending_events: Vec<PendingEvent>,
}

/// An event whose request is already marked available. `prior` is the
/// status the request goes back to if the sink rejects the event.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event: MediaAvailableEvent,
    pub prior: RequestStatus,
}

/// Owns the lock map and applies observations to stored records.
///
/// Every mutation of a record goes through here while the title's lock is
/// held. Events are collected under the lock and published once it is
/// released. A request whose event the sink rejects is reopened, and the
/// next observation of the title announces it again.
pub struct Reconciler {
    store: Arc<dyn StatusStore>,
    requests: Arc<dyn RequestLedger>,
    events: Arc<dyn AvailabilityEventSink>,
    locks: ContentLockMap,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn StatusStore>,
        requests: Arc<dyn RequestLedger>,
        events: Arc<dyn AvailabilityEventSink>,
    ) -> Self {
        Self {
            store,
            requests,
            events,
            locks: ContentLockMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    pub fn locks(&self) -> &ContentLockMap {
        &self.locks
    }

    pub async fn lock(&self, kind: MediaKind, id: CanonicalId) -> ContentLock {
        self.locks.lock(kind.lock_key(id)).await
    }

    /// Locks, applies and publishes in one go.
    pub async fn apply(
        &self,
        observation: &Observation,
        expected: &ExpectedSeasons,
        tiers: &[Tier],
    ) -> Result<(ApplyOutcome, usize)> {
        let identity = &observation.identity;
        let lock = self.lock(identity.kind, identity.canonical_id).await;
        let outcome = self.apply_locked(&lock, observation, expected, tiers).await;
        drop(lock);
        let mut outcome = outcome?;
        let published = self.dispatch(std::mem::take(&mut outcome.pending_events)).await;
        Ok((outcome, published))
    }

    /// Applies an observation. `lock` must be the title's lock.
    pub async fn apply_locked(
        &self,
        lock: &ContentLock,
        observation: &Observation,
        expected: &ExpectedSeasons,
        tiers: &[Tier],
    ) -> Result<ApplyOutcome> {
        let identity = &observation.identity;
        check_lock(lock, identity)?;

        let prior = self.store.load(identity.kind, identity.canonical_id).await?;
        if prior.as_ref().is_some_and(|p| p.record.is_deleted()) {
            debug!(key = lock.key(), "record deleted; observation ignored");
            return Ok(ApplyOutcome {
                skipped_deleted: true,
                view: prior,
                ..Default::default()
            });
        }

        let next = plan_reconciliation(prior.as_ref(), observation, expected, tiers, Utc::now());
        self.commit(prior, next).await
    }

    /// Forces `tier` to available on the title and its seasons.
    pub async fn promote_locked(
        &self,
        lock: &ContentLock,
        identity: &ContentIdentity,
        tier: Tier,
    ) -> Result<ApplyOutcome> {
        check_lock(lock, identity)?;
        let Some(prior) = self.store.load(identity.kind, identity.canonical_id).await? else {
            return Err(AvailarrError::NotFound(format!("record {}", identity.lock_key())));
        };
        if prior.record.is_deleted() {
            return Ok(ApplyOutcome {
                skipped_deleted: true,
                view: Some(prior),
                ..Default::default()
            });
        }
        let next = promote_tier(&prior, tier, Utc::now());
        self.commit(Some(prior), next).await
    }

    async fn commit(
        &self,
        prior: Option<AvailabilityView>,
        next: ReconciledState,
    ) -> Result<ApplyOutcome> {
        if !next.differs_from(prior.as_ref()) {
            // Unchanged titles still settle requests left outstanding by a
            // rejected publish.
            let pending_events = match &prior {
                Some(view) => self.cascade(&view.record, &view.seasons).await?,
                None => Vec::new(),
            };
            return Ok(ApplyOutcome {
                view: prior,
                pending_events,
                ..Default::default()
            });
        }

        self.store.save(&next.record, &next.seasons).await?;
        let promoted = next.promoted_tiers(prior.as_ref());
        info!(
            target: "availarr::reconcile",
            key = %next.record.lock_key(),
            status = %next.record.status,
            status_high_tier = %next.record.status_high_tier,
            promoted = ?promoted,
            "availability updated"
        );

        let pending_events = self.cascade(&next.record, &next.seasons).await?;

        Ok(ApplyOutcome {
            changed: true,
            skipped_deleted: false,
            view: Some(next.into_view()),
            pending_events,
        })
    }

    /// Marks every outstanding request the current state satisfies.
    async fn cascade(
        &self,
        record: &AvailabilityRecord,
        seasons: &[SeasonRecord],
    ) -> Result<Vec<PendingEvent>> {
        let outstanding = self
            .requests
            .outstanding_for(record.kind, record.canonical_id)
            .await?;
        let mut events = Vec::new();
        for request in outstanding {
            if !is_satisfied(&request, record, seasons) {
                continue;
            }
            if self.requests.mark_available(request.id).await? {
                events.push(PendingEvent {
                    event: MediaAvailableEvent {
                        request_id: request.id,
                        canonical_id: request.canonical_id,
                        kind: request.kind,
                        tier: request.tier,
                        seasons: request.seasons.clone(),
                        occurred_at: Utc::now(),
                    },
                    prior: request.status,
                });
            }
        }
        Ok(events)
    }

    /// Publishes events collected under a lock. Returns how many the sink
    /// accepted; the requests behind rejected events are reopened.
    pub async fn dispatch(&self, events: Vec<PendingEvent>) -> usize {
        let mut published = 0;
        for PendingEvent { event, prior } in events {
            let request_id = event.request_id;
            let err = match self.events.publish(event).await {
                Ok(()) => {
                    published += 1;
                    continue;
                }
                Err(err) => err,
            };
            warn!(request_id = %request_id, error = %err, "failed to publish availability event; request reopened");
            if let Err(err) = self.requests.reopen(request_id, prior).await {
                error!(request_id = %request_id, error = %err, "failed to reopen request after rejected event");
            }
        }
        published
    }
}

fn check_lock(lock: &ContentLock, identity: &ContentIdentity) -> Result<()> {
    if lock.key() == identity.lock_key() {
        Ok(())
    } else {
        Err(AvailarrError::Internal(format!(
            "lock {} does not cover {}",
            lock.key(),
            identity.lock_key()
        )))
    }
}

/// Whole-title requests need the title available; season requests need each
/// listed season available. Both in the request's tier.
fn is_satisfied(
    request: &MediaRequest,
    record: &AvailabilityRecord,
    seasons: &[SeasonRecord],
) -> bool {
    if request.seasons.is_empty() {
        return record.status_for(request.tier) == AvailabilityStatus::Available;
    }
    request.seasons.iter().all(|number| {
        seasons
            .iter()
            .find(|s| s.season_number == *number)
            .is_some_and(|s| s.status_for(request.tier) == AvailabilityStatus::Available)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::TierCounts;
    use crate::events::InMemoryEventSink;
    use crate::persistence::{InMemoryRequestLedger, InMemoryStatusStore, StatusStore as _};
    use availarr_model::SourceId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects the first `failures` events, then records the rest.
    #[derive(Debug)]
    struct RejectingSink {
        failures: AtomicUsize,
        inner: InMemoryEventSink,
    }

    #[async_trait]
    impl AvailabilityEventSink for RejectingSink {
        async fn publish(&self, event: MediaAvailableEvent) -> Result<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(AvailarrError::Internal("sink unavailable".into()));
            }
            self.inner.publish(event).await
        }
    }

    fn movie(copies: u32) -> Observation {
        let mut obs = Observation::new(
            ContentIdentity::new(CanonicalId(603), MediaKind::Movie),
            SourceId::from("plex-main"),
            "5123",
        );
        obs.movie = TierCounts {
            standard: copies,
            high_tier: 0,
        };
        obs
    }

    struct Fixture {
        reconciler: Reconciler,
        store: InMemoryStatusStore,
        ledger: InMemoryRequestLedger,
        sink: InMemoryEventSink,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStatusStore::new();
        let ledger = InMemoryRequestLedger::new();
        let sink = InMemoryEventSink::new();
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Arc::new(sink.clone()),
        );
        Fixture {
            reconciler,
            store,
            ledger,
            sink,
        }
    }

    fn series(seasons: &[(i32, u32)]) -> Observation {
        let mut obs = Observation::new(
            ContentIdentity::new(CanonicalId(1399), MediaKind::Series),
            SourceId::from("plex-main"),
            "90",
        );
        for (n, count) in seasons {
            obs.seasons.insert(
                *n,
                TierCounts {
                    standard: *count,
                    high_tier: 0,
                },
            );
        }
        obs
    }

    #[tokio::test]
    async fn season_request_fulfilled_before_whole_show() {
        let fx = fixture();
        let season_one = fx
            .ledger
            .submit(MediaKind::Series, CanonicalId(1399), Tier::Standard, vec![1])
            .await;
        let whole = fx
            .ledger
            .submit(MediaKind::Series, CanonicalId(1399), Tier::Standard, Vec::new())
            .await;
        let expected: ExpectedSeasons = [(1, 10), (2, 10)].into_iter().collect();

        let (outcome, published) = fx
            .reconciler
            .apply(&series(&[(1, 10), (2, 3)]), &expected, &Tier::ALL)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(published, 1);
        let events = fx.sink.events().await;
        assert_eq!(events[0].request_id, season_one);
        assert!(fx.ledger.get(whole).await.unwrap().status.is_outstanding());

        let (_, published) = fx
            .reconciler
            .apply(&series(&[(1, 10), (2, 10)]), &expected, &Tier::ALL)
            .await
            .unwrap();
        assert_eq!(published, 1);
        assert_eq!(fx.sink.events().await[1].request_id, whole);
    }

    #[tokio::test]
    async fn rejected_event_is_announced_on_the_next_pass() {
        let store = InMemoryStatusStore::new();
        let ledger = InMemoryRequestLedger::new();
        let delivered = InMemoryEventSink::new();
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Arc::new(RejectingSink {
                failures: AtomicUsize::new(1),
                inner: delivered.clone(),
            }),
        );
        let request = ledger
            .submit(MediaKind::Movie, CanonicalId(603), Tier::Standard, Vec::new())
            .await;
        let expected = ExpectedSeasons::default();

        let (first, published) = reconciler.apply(&movie(1), &expected, &Tier::ALL).await.unwrap();
        assert!(first.changed);
        assert_eq!(published, 0);
        assert_eq!(
            ledger.get(request).await.unwrap().status,
            RequestStatus::Pending
        );

        let (second, published) = reconciler.apply(&movie(1), &expected, &Tier::ALL).await.unwrap();
        assert!(!second.changed);
        assert_eq!(published, 1);
        assert_eq!(store.write_count(), 1);

        for _ in 0..2 {
            let (_, published) = reconciler.apply(&movie(1), &expected, &Tier::ALL).await.unwrap();
            assert_eq!(published, 0);
        }
        let events = delivered.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id, request);
        assert_eq!(
            ledger.get(request).await.unwrap().status,
            RequestStatus::Available
        );
    }

    #[tokio::test]
    async fn request_filed_after_availability_is_announced() {
        let fx = fixture();
        let expected = ExpectedSeasons::default();
        fx.reconciler.apply(&movie(1), &expected, &Tier::ALL).await.unwrap();
        let request = fx
            .ledger
            .submit(MediaKind::Movie, CanonicalId(603), Tier::Standard, Vec::new())
            .await;

        let (outcome, published) = fx.reconciler.apply(&movie(1), &expected, &Tier::ALL).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(published, 1);
        assert_eq!(fx.sink.events().await[0].request_id, request);
    }

    #[tokio::test]
    async fn unchanged_observation_writes_nothing() {
        let fx = fixture();
        let expected: ExpectedSeasons = [(1, 10)].into_iter().collect();
        let obs = series(&[(1, 10)]);
        fx.reconciler.apply(&obs, &expected, &Tier::ALL).await.unwrap();
        let (second, _) = fx.reconciler.apply(&obs, &expected, &Tier::ALL).await.unwrap();
        assert!(!second.changed);
        assert_eq!(fx.store.write_count(), 1);
        assert!(fx.reconciler.locks().is_empty());
    }

    #[tokio::test]
    async fn wrong_lock_is_rejected() {
        let fx = fixture();
        let lock = fx.reconciler.lock(MediaKind::Movie, CanonicalId(1399)).await;
        let err = fx
            .reconciler
            .apply_locked(&lock, &series(&[]), &ExpectedSeasons::default(), &Tier::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailarrError::Internal(_)));
    }

    #[tokio::test]
    async fn deleted_record_is_skipped() {
        let fx = fixture();
        let expected: ExpectedSeasons = [(1, 10)].into_iter().collect();
        fx.reconciler
            .apply(&series(&[(1, 4)]), &expected, &Tier::ALL)
            .await
            .unwrap();
        fx.store
            .mark_deleted(MediaKind::Series, CanonicalId(1399))
            .await
            .unwrap();
        let (outcome, _) = fx
            .reconciler
            .apply(&series(&[(1, 10)]), &expected, &Tier::ALL)
            .await
            .unwrap();
        assert!(outcome.skipped_deleted);
        assert_eq!(fx.store.write_count(), 1);
    }
}
