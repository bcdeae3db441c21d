//! Scripted sources and catalog shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use availarr_core::availability::{EpisodeAirDate, Rendition};
use availarr_core::config::EngineConfig;
use availarr_core::events::InMemoryEventSink;
use availarr_core::identity::{IdentityResolver, InMemoryIdentityCache};
use availarr_core::persistence::{
    InMemoryCheckpointStore, InMemoryFulfillmentCache, InMemoryRequestLedger, InMemoryStatusStore,
    StatusStore,
};
use availarr_core::providers::{
    CatalogLookup, CatalogMatch, ExternalId, ProviderError, SeasonEpisodes,
};
use availarr_core::reconcile::Reconciler;
use availarr_core::safety_net::SafetyNetJob;
use availarr_core::scan::ScanOrchestrator;
use availarr_core::sources::{
    ItemKind, LibraryItem, LibraryKind, LibraryPage, MediaSource, PageRequest, SourceCatalog,
    SourceDescriptor, SourceError, SourceKind, SourceLibrary, StaticSourceCatalog,
};
use availarr_model::{AvailabilityView, CanonicalId, ContentIdentity, MediaKind, SourceId};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

pub fn hd() -> Rendition {
    Rendition {
        width: Some(1920),
        height: Some(1080),
        resolution: Some("1080".into()),
        video_codec: Some("h264".into()),
    }
}

pub fn uhd() -> Rendition {
    Rendition {
        width: Some(3840),
        height: Some(2160),
        resolution: Some("4k".into()),
        video_codec: Some("hevc".into()),
    }
}

pub fn movie(key: &str, title: &str, year: i32, identifiers: &[&str], renditions: Vec<Rendition>) -> LibraryItem {
    LibraryItem {
        key: key.into(),
        kind: Some(ItemKind::Movie),
        title: title.into(),
        year: Some(year),
        identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        renditions,
        added_at: Some(Utc::now() - ChronoDuration::days(30)),
        ..Default::default()
    }
}

pub fn show(key: &str, title: &str, identifiers: &[&str]) -> LibraryItem {
    LibraryItem {
        key: key.into(),
        kind: Some(ItemKind::Show),
        title: title.into(),
        identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        added_at: Some(Utc::now() - ChronoDuration::days(30)),
        ..Default::default()
    }
}

pub fn season(show_key: &str, number: i32) -> LibraryItem {
    LibraryItem {
        key: format!("{show_key}/s{number}"),
        kind: Some(ItemKind::Season),
        index: Some(number),
        parent_key: Some(show_key.into()),
        ..Default::default()
    }
}

pub fn episode(show_key: &str, season: i32, number: i32, renditions: Vec<Rendition>) -> LibraryItem {
    LibraryItem {
        key: format!("{show_key}/s{season}/e{number}"),
        kind: Some(ItemKind::Episode),
        index: Some(number),
        parent_index: Some(season),
        parent_key: Some(format!("{show_key}/s{season}")),
        grandparent_key: Some(show_key.into()),
        renditions,
        added_at: Some(Utc::now() - ChronoDuration::days(30)),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct Script {
    libraries: Vec<SourceLibrary>,
    listings: HashMap<String, Vec<LibraryItem>>,
    items: HashMap<String, LibraryItem>,
    children: HashMap<String, Vec<LibraryItem>>,
    page_requests: Vec<PageRequest>,
    fail_auth: bool,
    fail_fetch: Vec<String>,
}

/// In-memory source driven by a script. Listing honours `added_after`
/// against each item's `added_at`.
#[derive(Debug, Clone)]
pub struct FakeSource {
    descriptor: SourceDescriptor,
    script: Arc<Mutex<Script>>,
    fetches: Arc<AtomicUsize>,
    fetch_delay: Duration,
    cancel_on_fetch: Option<CancellationToken>,
}

impl FakeSource {
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: SourceDescriptor {
                id: SourceId::new(id),
                name: format!("{id} server"),
                kind: SourceKind::Plex,
                high_tier: false,
                enabled: true,
            },
            script: Arc::default(),
            fetches: Arc::default(),
            fetch_delay: Duration::ZERO,
            cancel_on_fetch: None,
        }
    }

    pub fn high_tier(mut self) -> Self {
        self.descriptor.high_tier = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.descriptor.enabled = false;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Cancels `token` on the first item fetch.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    pub fn id(&self) -> SourceId {
        self.descriptor.id.clone()
    }

    pub fn failing_auth(self) -> Self {
        self.script.lock().unwrap().fail_auth = true;
        self
    }

    pub fn fail_fetch(&self, key: &str) {
        self.script.lock().unwrap().fail_fetch.push(key.into());
    }

    pub fn add_library(&self, key: &str, kind: LibraryKind) {
        self.script.lock().unwrap().libraries.push(SourceLibrary {
            key: key.into(),
            title: format!("library {key}"),
            kind,
        });
    }

    /// Adds a root item to a library listing.
    pub fn add_root(&self, library: &str, item: LibraryItem) {
        let mut script = self.script.lock().unwrap();
        script
            .listings
            .entry(library.into())
            .or_default()
            .push(item.clone());
        script.items.insert(item.key.clone(), item);
    }

    /// Adds a season with one episode per rendition list. Children are also
    /// listed as episodes so incremental passes see them.
    pub fn add_season(&self, library: &str, show_key: &str, number: i32, episodes: Vec<Vec<Rendition>>) {
        let mut script = self.script.lock().unwrap();
        let season = season(show_key, number);
        let eps: Vec<LibraryItem> = episodes
            .into_iter()
            .enumerate()
            .map(|(i, r)| episode(show_key, number, i as i32 + 1, r))
            .collect();
        script
            .listings
            .entry(format!("{library}#episodes"))
            .or_default()
            .extend(eps.iter().cloned());
        script.children.insert(season.key.clone(), eps);
        let seasons = script.children.entry(show_key.into()).or_default();
        seasons.retain(|s| s.index != Some(number));
        seasons.push(season);
    }

    /// Marks every listed item of `key` as freshly added.
    pub fn touch(&self, key: &str, at: DateTime<Utc>) {
        let mut script = self.script.lock().unwrap();
        for listing in script.listings.values_mut() {
            for item in listing.iter_mut().filter(|i| i.key == key || i.grandparent_key.as_deref() == Some(key)) {
                item.added_at = Some(at);
            }
        }
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.script.lock().unwrap().page_requests.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn authenticate(&self) -> Result<(), SourceError> {
        if self.script.lock().unwrap().fail_auth {
            return Err(SourceError::Unauthorized("bad token".into()));
        }
        Ok(())
    }

    async fn libraries(&self) -> Result<Vec<SourceLibrary>, SourceError> {
        Ok(self.script.lock().unwrap().libraries.clone())
    }

    async fn library_page(
        &self,
        library: &SourceLibrary,
        page: PageRequest,
    ) -> Result<LibraryPage, SourceError> {
        let mut script = self.script.lock().unwrap();
        script.page_requests.push(page);
        let listing_key = match (&library.kind, page.added_after) {
            (LibraryKind::Series, Some(_)) => format!("{}#episodes", library.key),
            _ => library.key.clone(),
        };
        let listed: Vec<LibraryItem> = script
            .listings
            .get(&listing_key)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| match (page.added_after, item.added_at) {
                (Some(cutoff), Some(added)) => added > cutoff,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();
        let total = listed.len();
        let items = listed.into_iter().skip(page.offset).take(page.size).collect();
        Ok(LibraryPage { items, total })
    }

    async fn fetch_item(&self, key: &str) -> Result<LibraryItem, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let script = self.script.lock().unwrap();
        if script.fail_fetch.iter().any(|k| k == key) {
            return Err(SourceError::Api {
                status: 500,
                message: "internal error".into(),
            });
        }
        script
            .items
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(key.into()))
    }

    async fn fetch_children(&self, key: &str) -> Result<Vec<LibraryItem>, SourceError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .children
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_by_identity(
        &self,
        identity: &ContentIdentity,
        _hint: Option<&str>,
    ) -> Result<Vec<LibraryItem>, SourceError> {
        let wanted = format!("tmdb://{}", identity.canonical_id);
        Ok(self
            .script
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|item| item.is_root() && item.identifiers.contains(&wanted))
            .cloned()
            .collect())
    }
}

/// Catalog with canned answers that counts every lookup.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    search_results: Mutex<HashMap<String, Vec<CatalogMatch>>>,
    find_results: Mutex<HashMap<String, Vec<CatalogMatch>>>,
    seasons: Mutex<HashMap<CanonicalId, Vec<SeasonEpisodes>>>,
    lookups: AtomicUsize,
    season_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_search(&self, title: &str, found: CatalogMatch) {
        self.search_results
            .lock()
            .unwrap()
            .entry(title.to_lowercase())
            .or_default()
            .push(found);
    }

    pub fn add_find(&self, external: &str, found: CatalogMatch) {
        self.find_results
            .lock()
            .unwrap()
            .entry(external.into())
            .or_default()
            .push(found);
    }

    /// Registers a series whose seasons have `aired` past episodes each,
    /// plus `unaired` future episodes.
    pub fn add_series(&self, id: i64, seasons: &[(i32, u32, u32)]) {
        let today = Utc::now().date_naive();
        let past = today - ChronoDuration::days(60);
        let future = today + ChronoDuration::days(60);
        let seasons = seasons
            .iter()
            .map(|(number, aired, unaired)| SeasonEpisodes {
                season_number: *number,
                episodes: air_dates(*aired, past)
                    .into_iter()
                    .chain(air_dates(*unaired, future).into_iter().map(|mut ep| {
                        ep.episode_number += *aired as i32;
                        ep
                    }))
                    .collect(),
            })
            .collect();
        self.seasons.lock().unwrap().insert(CanonicalId(id), seasons);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn season_calls(&self) -> usize {
        self.season_calls.load(Ordering::SeqCst)
    }
}

fn air_dates(count: u32, date: NaiveDate) -> Vec<EpisodeAirDate> {
    (1..=count as i32)
        .map(|n| EpisodeAirDate {
            episode_number: n,
            air_date: Some(date),
        })
        .collect()
}

#[async_trait]
impl CatalogLookup for FakeCatalog {
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Vec<CatalogMatch>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .find_results
            .lock()
            .unwrap()
            .get(&id.value())
            .cloned()
            .unwrap_or_default())
    }

    async fn search(
        &self,
        _kind: MediaKind,
        title: &str,
        _year: Option<i32>,
    ) -> Result<Vec<CatalogMatch>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .search_results
            .lock()
            .unwrap()
            .get(&title.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn season_episodes(
        &self,
        series: CanonicalId,
    ) -> Result<Vec<SeasonEpisodes>, ProviderError> {
        self.season_calls.fetch_add(1, Ordering::SeqCst);
        self.seasons
            .lock()
            .unwrap()
            .get(&series)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scan.batch_pause_ms = 0;
    config.scan.page_size = 2;
    config.safety_net.item_delay_ms = 0;
    config.request_timeout_secs = 5;
    config
}

/// Engine assembled over in-memory stores.
pub struct Harness {
    pub store: Arc<InMemoryStatusStore>,
    pub requests: Arc<InMemoryRequestLedger>,
    pub fulfillment: Arc<InMemoryFulfillmentCache>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
    pub events: Arc<InMemoryEventSink>,
    pub cache: Arc<InMemoryIdentityCache>,
    pub catalog: Arc<FakeCatalog>,
    pub reconciler: Arc<Reconciler>,
    pub orchestrator: ScanOrchestrator,
    pub safety_net: SafetyNetJob,
}

impl Harness {
    pub async fn find(&self, kind: MediaKind, id: i64) -> Option<AvailabilityView> {
        self.store.load(kind, CanonicalId(id)).await.unwrap()
    }

    pub async fn view(&self, kind: MediaKind, id: i64) -> AvailabilityView {
        self.find(kind, id).await.expect("record should exist")
    }

    pub fn new(sources: Vec<FakeSource>, catalog: FakeCatalog) -> Self {
        Self::with_config(sources, catalog, test_config())
    }

    pub fn with_config(sources: Vec<FakeSource>, catalog: FakeCatalog, config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryStatusStore::new());
        let requests = Arc::new(InMemoryRequestLedger::new());
        let fulfillment = Arc::new(InMemoryFulfillmentCache::new());
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let events = Arc::new(InMemoryEventSink::new());
        let cache = Arc::new(InMemoryIdentityCache::new());
        let catalog = Arc::new(catalog);
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            requests.clone(),
            events.clone(),
        ));
        let sources: Arc<dyn SourceCatalog> = Arc::new(StaticSourceCatalog::new(
            sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn MediaSource>)
                .collect(),
        ));
        let resolver = Arc::new(IdentityResolver::new(
            catalog.clone(),
            cache.clone(),
            config.request_timeout(),
        ));
        let orchestrator = ScanOrchestrator::new(
            sources.clone(),
            resolver,
            catalog.clone(),
            reconciler.clone(),
            checkpoints.clone(),
            config.clone(),
        );
        let safety_net = SafetyNetJob::new(
            store.clone(),
            fulfillment.clone(),
            sources,
            catalog.clone(),
            reconciler.clone(),
            config,
        );
        Self {
            store,
            requests,
            fulfillment,
            checkpoints,
            events,
            cache,
            catalog,
            reconciler,
            orchestrator,
            safety_net,
        }
    }
}
