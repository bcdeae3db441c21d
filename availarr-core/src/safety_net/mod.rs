//! Periodic corroboration of titles stuck in `processing`.
//!
//! A download can finish without any scan noticing it. For every record
//! with a processing tier the job first asks the fulfillment cache, then
//! asks each source directly for the title. Either way the update goes
//! through the [`Reconciler`], so request cascades and events behave exactly
//! as they do during scans.

use std::fmt;
use std::sync::Arc;

use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, ContentIdentity, MediaKind, SafetyNetSummary,
    ScanError, ScanErrorKind, Tier,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::availability::{ExpectedSeasons, Observation};
use crate::config::EngineConfig;
use crate::error::{AvailarrError, Result};
use crate::persistence::{FulfillmentCache, StatusStore};
use crate::providers::CatalogLookup;
use crate::reconcile::Reconciler;
use crate::scan::{classify, expected_seasons, observe_item};
use crate::sources::{MediaSource, SourceCatalog};
use crate::timeout::bounded;

#[derive(Debug, Default)]
struct RecordOutcome {
    updated: bool,
    events: usize,
    errors: Vec<ScanError>,
}

pub struct SafetyNetJob {
    store: Arc<dyn StatusStore>,
    fulfillment: Arc<dyn FulfillmentCache>,
    sources: Arc<dyn SourceCatalog>,
    catalog: Arc<dyn CatalogLookup>,
    reconciler: Arc<Reconciler>,
    config: EngineConfig,
}

impl fmt::Debug for SafetyNetJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafetyNetJob")
            .field("fulfillment", &self.fulfillment)
            .field("sources", &self.sources)
            .field("config", &self.config.safety_net)
            .finish_non_exhaustive()
    }
}

impl SafetyNetJob {
    pub fn new(
        store: Arc<dyn StatusStore>,
        fulfillment: Arc<dyn FulfillmentCache>,
        sources: Arc<dyn SourceCatalog>,
        catalog: Arc<dyn CatalogLookup>,
        reconciler: Arc<Reconciler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            fulfillment,
            sources,
            catalog,
            reconciler,
            config: config.normalized(),
        }
    }

    /// Examines every record with a processing tier once.
    #[instrument(name = "safety_net", skip_all)]
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<SafetyNetSummary> {
        let started = Utc::now();
        let candidates = self.store.list_by_status(AvailabilityStatus::Processing).await?;
        let sources = self.sources.enabled_sources().await?;
        let delay = self.config.safety_net.item_delay();

        let mut summary = SafetyNetSummary::default();
        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(target: "availarr::safety_net", examined = summary.examined, "safety net cancelled");
                break;
            }
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            summary.examined += 1;
            let outcome = self.examine(candidate, &sources).await;
            summary.updated_count += usize::from(outcome.updated);
            summary.events_emitted += outcome.events;
            summary.errors.extend(outcome.errors);
        }

        info!(
            target: "availarr::safety_net",
            candidates = candidates.len(),
            examined = summary.examined,
            updated = summary.updated_count,
            events = summary.events_emitted,
            errors = summary.errors.len(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "safety net pass finished"
        );
        Ok(summary)
    }

    async fn examine(
        &self,
        candidate: &AvailabilityRecord,
        sources: &[Arc<dyn MediaSource>],
    ) -> RecordOutcome {
        let identity = ContentIdentity::new(candidate.canonical_id, candidate.kind);
        let context = format!("record={}", identity.lock_key());
        let mut outcome = RecordOutcome::default();

        let remaining = match self.promote_fulfilled(&identity, &mut outcome).await {
            Ok(remaining) => remaining,
            Err(err) => {
                warn!(%context, error = %err, "fulfillment check failed");
                outcome.errors.push(ScanError::new(
                    classify(&err, ScanErrorKind::DataInconsistency),
                    context,
                    err.to_string(),
                ));
                return outcome;
            }
        };
        let Some((record, tiers)) = remaining else {
            return outcome;
        };

        match self
            .corroborate(&identity, &record, &tiers, sources, &mut outcome)
            .await
        {
            Ok(()) => {}
            Err(err) => {
                warn!(%context, error = %err, "targeted reconcile failed");
                outcome.errors.push(ScanError::new(
                    classify(&err, ScanErrorKind::DataInconsistency),
                    context,
                    err.to_string(),
                ));
            }
        }
        outcome
    }

    /// Promotes tiers the fulfillment cache confirms. Returns the fresh
    /// record and the tiers still processing, or `None` when nothing is left
    /// to corroborate.
    async fn promote_fulfilled(
        &self,
        identity: &ContentIdentity,
        outcome: &mut RecordOutcome,
    ) -> Result<Option<(AvailabilityRecord, Vec<Tier>)>> {
        let lock = self
            .reconciler
            .lock(identity.kind, identity.canonical_id)
            .await;

        // The listing may be stale by the time the lock is held.
        let Some(mut view) = self.store.load(identity.kind, identity.canonical_id).await? else {
            return Ok(None);
        };
        if view.record.is_deleted() {
            return Ok(None);
        }

        let mut pending = Vec::new();
        let mut remaining = Vec::new();
        for tier in Tier::ALL {
            if view.record.status_for(tier) != AvailabilityStatus::Processing {
                continue;
            }
            let complete = self
                .fulfillment
                .has_complete_file(identity.kind, identity.canonical_id, tier)
                .await?;
            if !complete {
                remaining.push(tier);
                continue;
            }
            debug!(key = lock.key(), %tier, "fulfillment cache reports a complete file");
            let mut applied = self.reconciler.promote_locked(&lock, identity, tier).await?;
            outcome.updated |= applied.changed;
            pending.append(&mut applied.pending_events);
            if let Some(next) = applied.view {
                view = next;
            }
        }
        drop(lock);

        outcome.events += self.reconciler.dispatch(pending).await;
        if remaining.is_empty() {
            Ok(None)
        } else {
            Ok(Some((view.record, remaining)))
        }
    }

    async fn corroborate(
        &self,
        identity: &ContentIdentity,
        record: &AvailabilityRecord,
        tiers: &[Tier],
        sources: &[Arc<dyn MediaSource>],
        outcome: &mut RecordOutcome,
    ) -> Result<()> {
        let timeout = self.config.request_timeout();
        let mut observation: Option<Observation> = None;

        for source in sources {
            let descriptor = source.descriptor();
            let context = format!("record={} source={}", identity.lock_key(), descriptor.id);
            let hint = match (&record.source_id, &record.source_key) {
                (Some(id), Some(key)) if id == &descriptor.id => Some(key.as_str()),
                _ => None,
            };
            let items = match bounded(
                timeout,
                "find_by_identity",
                source.find_by_identity(identity, hint),
            )
            .await
            {
                Ok(items) => items,
                Err(err) => {
                    let err = AvailarrError::from(err);
                    warn!(%context, error = %err, "targeted lookup failed");
                    outcome.errors.push(ScanError::new(
                        classify(&err, ScanErrorKind::SourceOutage),
                        context,
                        err.to_string(),
                    ));
                    continue;
                }
            };
            for item in &items {
                match observe_item(
                    source.as_ref(),
                    item,
                    identity.clone(),
                    &self.config.renditions,
                    timeout,
                )
                .await
                {
                    Ok(seen) => match observation.as_mut() {
                        Some(merged) => merged.merge(&seen),
                        None => observation = Some(seen),
                    },
                    Err(err) => {
                        let err = AvailarrError::from(err);
                        warn!(%context, item = %item.key, error = %err, "observing item failed");
                        outcome.errors.push(ScanError::new(
                            classify(&err, ScanErrorKind::DataInconsistency),
                            format!("{context} item={}", item.key),
                            err.to_string(),
                        ));
                    }
                }
            }
        }

        let Some(observation) = observation else {
            debug!(key = %identity.lock_key(), "no source holds the title yet");
            return Ok(());
        };

        let expected = match identity.kind {
            MediaKind::Movie => ExpectedSeasons::default(),
            MediaKind::Series => {
                expected_seasons(
                    self.catalog.as_ref(),
                    identity.canonical_id,
                    Utc::now().date_naive(),
                    timeout,
                )
                .await?
            }
        };

        let (applied, published) = self.reconciler.apply(&observation, &expected, tiers).await?;
        outcome.updated |= applied.changed;
        outcome.events += published;
        Ok(())
    }
}
