use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use availarr_model::{
    CanonicalId, ContentIdentity, MediaKind, ScanError, ScanErrorKind, ScanMode, ScanResult,
    SourceId, SourceScanSummary, Tier,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::classify;
use super::context::ScanPass;
use super::observe::{expected_seasons, observe_item};
use crate::availability::ExpectedSeasons;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::identity::{IdentityResolver, ResolveRequest};
use crate::persistence::ScanCheckpointStore;
use crate::providers::CatalogLookup;
use crate::reconcile::Reconciler;
use crate::sources::{
    ItemKind, LibraryItem, MediaSource, PageRequest, SourceCatalog, SourceError, SourceLibrary,
};
use crate::timeout::bounded;

/// A title to process, discovered directly or through one of its episodes.
#[derive(Debug, Clone)]
struct RootItem {
    key: String,
    /// The listing entry when it was the root itself.
    listed: Option<LibraryItem>,
}

#[derive(Debug, Default)]
struct ItemOutcome {
    newly_resolved: bool,
    updated: bool,
    error: Option<ScanError>,
}

impl ItemOutcome {
    fn failed(kind: ScanErrorKind, context: String, message: impl Into<String>) -> Self {
        Self {
            error: Some(ScanError::new(kind, context, message)),
            ..Default::default()
        }
    }
}

/// Walks sources, resolves their titles and reconciles availability.
pub struct ScanOrchestrator {
    sources: Arc<dyn SourceCatalog>,
    resolver: Arc<IdentityResolver>,
    catalog: Arc<dyn CatalogLookup>,
    reconciler: Arc<Reconciler>,
    checkpoints: Arc<dyn ScanCheckpointStore>,
    config: EngineConfig,
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("sources", &self.sources)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    pub fn new(
        sources: Arc<dyn SourceCatalog>,
        resolver: Arc<IdentityResolver>,
        catalog: Arc<dyn CatalogLookup>,
        reconciler: Arc<Reconciler>,
        checkpoints: Arc<dyn ScanCheckpointStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sources,
            resolver,
            catalog,
            reconciler,
            checkpoints,
            config: config.normalized(),
        }
    }

    /// Scans `source_ids` (every enabled source when empty).
    ///
    /// Only failing to list the sources is fatal; everything else lands in
    /// the per-source summaries.
    #[instrument(name = "scan", skip(self, cancel), fields(mode = %ScanMode::from_incremental(incremental)))]
    pub async fn scan(
        &self,
        source_ids: &[SourceId],
        incremental: bool,
        cancel: &CancellationToken,
    ) -> Result<ScanResult> {
        let started_at = Utc::now();
        let mode = ScanMode::from_incremental(incremental);
        let enabled = self.sources.enabled_sources().await?;

        let mut summaries = Vec::new();
        let selected: Vec<Arc<dyn MediaSource>> = if source_ids.is_empty() {
            enabled
        } else {
            for wanted in source_ids {
                if !enabled.iter().any(|s| &s.descriptor().id == wanted) {
                    let mut summary = SourceScanSummary::new(wanted.clone(), wanted.as_str());
                    summary.errors.push(ScanError::new(
                        ScanErrorKind::SourceOutage,
                        format!("source={wanted}"),
                        "source is unknown or disabled",
                    ));
                    summaries.push(summary);
                }
            }
            enabled
                .into_iter()
                .filter(|s| source_ids.contains(&s.descriptor().id))
                .collect()
        };

        let pass = ScanPass::default();
        let mut cancelled = false;
        for source in selected {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let (summary, source_cancelled) = self
                .scan_source(source.as_ref(), mode, started_at, &pass, cancel)
                .await;
            summaries.push(summary);
            if source_cancelled {
                cancelled = true;
                break;
            }
        }

        let result = ScanResult {
            mode,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            sources: summaries,
        };
        info!(
            target: "availarr::scan",
            %mode,
            sources = result.sources.len(),
            items_seen = result.items_seen(),
            updated = result.updated(),
            errors = result.error_count(),
            cancelled,
            elapsed_ms = (result.finished_at - started_at).num_milliseconds(),
            "scan finished"
        );
        Ok(result)
    }

    async fn scan_source(
        &self,
        source: &dyn MediaSource,
        mode: ScanMode,
        pass_started: DateTime<Utc>,
        pass: &ScanPass,
        cancel: &CancellationToken,
    ) -> (SourceScanSummary, bool) {
        let descriptor = source.descriptor();
        let mut summary = SourceScanSummary::new(descriptor.id.clone(), descriptor.name.clone());
        let timeout = self.config.request_timeout();
        let context = format!("source={}", descriptor.id);

        if let Err(err) = bounded(timeout, "authenticate", source.authenticate()).await {
            warn!(source = %descriptor.id, error = %err, "source authentication failed");
            summary
                .errors
                .push(source_error(ScanErrorKind::SourceOutage, &context, err));
            return (summary, false);
        }

        let added_after = match mode {
            ScanMode::Full => None,
            ScanMode::Incremental => self.incremental_cutoff(&descriptor.id, &mut summary).await,
        };

        let libraries = match bounded(timeout, "libraries", source.libraries()).await {
            Ok(libraries) => libraries,
            Err(err) => {
                warn!(source = %descriptor.id, error = %err, "library enumeration failed");
                summary
                    .errors
                    .push(source_error(ScanErrorKind::SourceOutage, &context, err));
                return (summary, false);
            }
        };

        let mut cancelled = false;
        for library in &libraries {
            let Some(kind) = library.kind.media_kind() else {
                debug!(source = %descriptor.id, library = %library.title, "skipping non-video library");
                continue;
            };
            summary.libraries_scanned += 1;
            if self
                .scan_library(source, library, kind, added_after, pass, &mut summary, cancel)
                .await
            {
                cancelled = true;
                break;
            }
        }

        if !cancelled {
            if let Err(err) = self.checkpoints.record_scan(&descriptor.id, pass_started).await {
                warn!(source = %descriptor.id, error = %err, "failed to advance scan checkpoint");
                summary.errors.push(ScanError::new(
                    classify(&err, ScanErrorKind::DataInconsistency),
                    context.clone(),
                    err.to_string(),
                ));
            }
        }

        info!(
            target: "availarr::scan",
            source = %descriptor.id,
            libraries = summary.libraries_scanned,
            items_seen = summary.items_seen,
            newly_resolved = summary.newly_resolved,
            updated = summary.updated,
            errors = summary.errors.len(),
            cancelled,
            "source scan finished"
        );
        (summary, cancelled)
    }

    /// `None` means no checkpoint yet, so the pass runs as a full scan.
    async fn incremental_cutoff(
        &self,
        source: &SourceId,
        summary: &mut SourceScanSummary,
    ) -> Option<DateTime<Utc>> {
        match self.checkpoints.last_scan(source).await {
            Ok(Some(last)) => {
                let cutoff = last - self.config.scan.incremental_buffer();
                Some(cutoff.max(DateTime::<Utc>::UNIX_EPOCH))
            }
            Ok(None) => {
                info!(source = %source, "no scan checkpoint; running full listing");
                None
            }
            Err(err) => {
                warn!(source = %source, error = %err, "checkpoint read failed; running full listing");
                summary.errors.push(ScanError::new(
                    classify(&err, ScanErrorKind::DataInconsistency),
                    format!("source={source}"),
                    err.to_string(),
                ));
                None
            }
        }
    }

    /// Returns true when the pass was cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn scan_library(
        &self,
        source: &dyn MediaSource,
        library: &SourceLibrary,
        kind: MediaKind,
        added_after: Option<DateTime<Utc>>,
        pass: &ScanPass,
        summary: &mut SourceScanSummary,
        cancel: &CancellationToken,
    ) -> bool {
        let descriptor = source.descriptor();
        let timeout = self.config.request_timeout();
        let page_size = self.config.scan.page_size;
        let batch_size = self.config.scan.batch_size;
        let context = format!("source={} library={}", descriptor.id, library.title);

        let mut seen_roots: HashSet<String> = HashSet::new();
        let mut offset = 0;
        loop {
            let request = PageRequest {
                offset,
                size: page_size,
                added_after,
            };
            let page = match bounded(timeout, "library_page", source.library_page(library, request))
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(source = %descriptor.id, library = %library.title, offset, error = %err, "library page failed");
                    summary.errors.push(source_error(
                        ScanErrorKind::SourceOutage,
                        &format!("{context} offset={offset}"),
                        err,
                    ));
                    return false;
                }
            };
            if page.items.is_empty() {
                return false;
            }
            offset += page.items.len();
            let more_pages = offset < page.total;

            let mut roots = Vec::new();
            for item in page.items {
                let Some(root_key) = item.root_key().map(str::to_string) else {
                    summary.errors.push(ScanError::new(
                        ScanErrorKind::DataInconsistency,
                        format!("{context} item={}", item.key),
                        "item has no parent title",
                    ));
                    continue;
                };
                if !seen_roots.insert(root_key.clone()) {
                    continue;
                }
                let listed = item.is_root().then_some(item);
                roots.push(RootItem {
                    key: root_key,
                    listed,
                });
            }

            let batches: Vec<&[RootItem]> = roots.chunks(batch_size).collect();
            let batch_count = batches.len();
            for (index, batch) in batches.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    info!(source = %descriptor.id, library = %library.title, "scan cancelled");
                    return true;
                }
                let outcomes = join_all(
                    batch
                        .iter()
                        .map(|root| self.process_item(source, kind, root, pass, &context)),
                )
                .await;
                for outcome in outcomes {
                    summary.items_seen += 1;
                    summary.newly_resolved += usize::from(outcome.newly_resolved);
                    summary.updated += usize::from(outcome.updated);
                    if let Some(error) = outcome.error {
                        summary.errors.push(error);
                    }
                }
                let last_batch = index + 1 == batch_count && !more_pages;
                if !last_batch && !self.config.scan.batch_pause().is_zero() {
                    tokio::time::sleep(self.config.scan.batch_pause()).await;
                }
            }

            if !more_pages {
                return false;
            }
        }
    }

    async fn process_item(
        &self,
        source: &dyn MediaSource,
        library_kind: MediaKind,
        root: &RootItem,
        pass: &ScanPass,
        context: &str,
    ) -> ItemOutcome {
        let descriptor = source.descriptor();
        let timeout = self.config.request_timeout();
        let context = format!("{context} item={}", root.key);

        if pass.is_miss(&descriptor.id, &root.key) {
            return ItemOutcome::default();
        }

        let mut full_item = None;
        let mut outcome = ItemOutcome::default();
        let identity = match self.resolver.cached(&descriptor.id, &root.key).await {
            Some(identity) => identity,
            None => {
                let item = match bounded(timeout, "fetch_item", source.fetch_item(&root.key)).await
                {
                    Ok(item) => item,
                    Err(err) => {
                        warn!(%context, error = %err, "item fetch failed");
                        return ItemOutcome {
                            error: Some(source_error(ScanErrorKind::SourceOutage, &context, err)),
                            ..Default::default()
                        };
                    }
                };
                let request = ResolveRequest {
                    source_id: &descriptor.id,
                    local_key: &root.key,
                    kind: item.media_kind().unwrap_or(library_kind),
                    title: &item.title,
                    year: item.year,
                    identifiers: &item.identifiers,
                };
                match self.resolver.resolve(&request).await {
                    Ok(Some(resolution)) => {
                        outcome.newly_resolved = resolution.is_new();
                        full_item = Some(item);
                        resolution.identity
                    }
                    Ok(None) => {
                        pass.record_miss(&descriptor.id, &root.key);
                        info!(%context, title = %item.title, year = ?item.year, "could not resolve title; skipping for this pass");
                        return ItemOutcome::failed(
                            ScanErrorKind::ResolutionMiss,
                            context,
                            format!("no catalog match for \"{}\"", item.title),
                        );
                    }
                    Err(err) => {
                        warn!(%context, error = %err, "identity resolution failed");
                        return ItemOutcome::failed(
                            classify(&err, ScanErrorKind::ResolutionMiss),
                            context,
                            err.to_string(),
                        );
                    }
                }
            }
        };

        let item = full_item
            .or_else(|| root.listed.clone())
            .unwrap_or_else(|| LibraryItem {
                key: root.key.clone(),
                kind: Some(match identity.kind {
                    MediaKind::Movie => ItemKind::Movie,
                    MediaKind::Series => ItemKind::Show,
                }),
                ..Default::default()
            });

        match self.reconcile_item(source, &item, identity, pass).await {
            Ok(updated) => outcome.updated = updated,
            Err(err) => {
                warn!(%context, error = %err, "reconciliation failed");
                outcome.error = Some(ScanError::new(
                    classify(&err, ScanErrorKind::DataInconsistency),
                    context,
                    err.to_string(),
                ));
            }
        }
        outcome
    }

    async fn reconcile_item(
        &self,
        source: &dyn MediaSource,
        item: &LibraryItem,
        identity: ContentIdentity,
        pass: &ScanPass,
    ) -> Result<bool> {
        let timeout = self.config.request_timeout();
        let observation =
            observe_item(source, item, identity, &self.config.renditions, timeout).await?;
        let identity = &observation.identity;
        let expected = match identity.kind {
            MediaKind::Movie => ExpectedSeasons::default(),
            MediaKind::Series => self.expected_for(identity.canonical_id, pass).await?,
        };

        let lock = self.reconciler.lock(identity.kind, identity.canonical_id).await;
        let merged = pass.merge(observation);
        let applied = self
            .reconciler
            .apply_locked(&lock, &merged, &expected, &Tier::ALL)
            .await;
        drop(lock);

        let mut applied = applied?;
        self.reconciler
            .dispatch(std::mem::take(&mut applied.pending_events))
            .await;
        Ok(applied.changed)
    }

    async fn expected_for(&self, id: CanonicalId, pass: &ScanPass) -> Result<ExpectedSeasons> {
        if let Some(expected) = pass.expected(id) {
            return Ok(expected);
        }
        let expected = expected_seasons(
            self.catalog.as_ref(),
            id,
            Utc::now().date_naive(),
            self.config.request_timeout(),
        )
        .await?;
        pass.remember_expected(id, expected.clone());
        Ok(expected)
    }
}

fn source_error(kind: ScanErrorKind, context: &str, err: SourceError) -> ScanError {
    let kind = if err.is_transient() {
        ScanErrorKind::TransientNetwork
    } else {
        kind
    };
    ScanError::new(kind, context, err.to_string())
}
