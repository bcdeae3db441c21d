use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use availarr_model::{CanonicalId, ContentIdentity, MediaKind, SourceId};
use tracing::{debug, warn};

use super::cache::IdentityCache;
use super::fuzzy::best_match;
use super::guid::{ParsedIdentifiers, parse_identifiers};
use crate::error::Result;
use crate::providers::{CatalogLookup, CatalogMatch, ExternalId, ProviderError};
use crate::timeout::bounded;

/// What the resolver knows about a library item.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub source_id: &'a SourceId,
    pub local_key: &'a str,
    /// Kind according to the source's library classification.
    pub kind: MediaKind,
    pub title: &'a str,
    pub year: Option<i32>,
    pub identifiers: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Cached,
    Embedded,
    ExternalId,
    TitleSearch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: ContentIdentity,
    pub method: ResolutionMethod,
}

impl Resolution {
    /// Resolved by the catalog rather than read from the cache.
    pub fn is_new(&self) -> bool {
        self.method != ResolutionMethod::Cached
    }
}

/// Maps `(source, local key)` to a canonical identity.
///
/// Resolution order: cache, embedded TMDB id, IMDb then TVDB via the
/// catalog's find endpoint, fuzzy title search. Every success is cached
/// before it is returned.
pub struct IdentityResolver {
    catalog: Arc<dyn CatalogLookup>,
    cache: Arc<dyn IdentityCache>,
    timeout: Duration,
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        cache: Arc<dyn IdentityCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            timeout,
        }
    }

    /// Cache-only lookup. A failing cache reads as a miss.
    pub async fn cached(&self, source_id: &SourceId, local_key: &str) -> Option<ContentIdentity> {
        match self.cache.get(source_id, local_key).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(source = %source_id, key = local_key, error = %err, "identity cache read failed");
                None
            }
        }
    }

    /// Resolves an item. `Ok(None)` is a resolution miss; `Err` is a catalog
    /// failure worth retrying on a later pass.
    pub async fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Option<Resolution>> {
        if let Some(identity) = self.cached(request.source_id, request.local_key).await {
            return Ok(Some(Resolution {
                identity,
                method: ResolutionMethod::Cached,
            }));
        }

        let parsed = parse_identifiers(request.identifiers);
        let Some((identity, method)) = self.lookup(request, &parsed).await? else {
            debug!(
                source = %request.source_id,
                key = request.local_key,
                title = request.title,
                year = ?request.year,
                "identity unresolved"
            );
            return Ok(None);
        };

        if let Err(err) = self
            .cache
            .put(request.source_id, request.local_key, &identity)
            .await
        {
            warn!(source = %request.source_id, key = request.local_key, error = %err, "identity cache write failed");
        }
        debug!(
            source = %request.source_id,
            key = request.local_key,
            canonical_id = %identity.canonical_id,
            kind = %identity.kind,
            ?method,
            "identity resolved"
        );
        Ok(Some(Resolution { identity, method }))
    }

    async fn lookup(
        &self,
        request: &ResolveRequest<'_>,
        parsed: &ParsedIdentifiers,
    ) -> Result<Option<(ContentIdentity, ResolutionMethod)>> {
        let with_ids = |identity: ContentIdentity| {
            identity
                .with_imdb(parsed.imdb.clone())
                .with_tvdb(parsed.tvdb)
        };

        if let Some(id) = parsed.tmdb.and_then(|raw| CanonicalId::new(raw).ok()) {
            return Ok(Some((
                with_ids(ContentIdentity::new(id, request.kind)),
                ResolutionMethod::Embedded,
            )));
        }

        let secondary = parsed
            .imdb
            .clone()
            .map(ExternalId::Imdb)
            .into_iter()
            .chain(parsed.tvdb.map(ExternalId::Tvdb));
        for external in secondary {
            let matches = self.find(&external).await?;
            if let Some(found) = pick_kind(&matches, request.kind) {
                return Ok(Some((
                    with_ids(ContentIdentity::new(found.canonical_id, found.kind)),
                    ResolutionMethod::ExternalId,
                )));
            }
        }

        if request.title.trim().is_empty() {
            return Ok(None);
        }
        let candidates = self.search(request.kind, request.title, request.year).await?;
        Ok(best_match(request.title, request.year, &candidates).map(|(found, score)| {
            debug!(title = request.title, candidate = %found.title, score, "fuzzy match accepted");
            (
                with_ids(ContentIdentity::new(found.canonical_id, found.kind)),
                ResolutionMethod::TitleSearch,
            )
        }))
    }

    async fn find(&self, external: &ExternalId) -> Result<Vec<CatalogMatch>> {
        match bounded(
            self.timeout,
            "catalog find",
            self.catalog.find_by_external_id(external),
        )
        .await
        {
            Ok(matches) => Ok(matches),
            Err(ProviderError::NotFound) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<CatalogMatch>> {
        let first = bounded(self.timeout, "catalog search", self.catalog.search(kind, title, year))
            .await?;
        if !first.is_empty() || year.is_none() {
            return Ok(first);
        }
        // Sources often carry the file's year rather than the release year.
        Ok(bounded(self.timeout, "catalog search", self.catalog.search(kind, title, None)).await?)
    }
}

/// Same-kind match first; a cross-kind match is accepted as a fallback.
fn pick_kind(matches: &[CatalogMatch], kind: MediaKind) -> Option<&CatalogMatch> {
    matches
        .iter()
        .find(|m| m.kind == kind)
        .or_else(|| matches.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityCache;
    use crate::providers::MockCatalogLookup;
    use mockall::predicate::*;

    fn matrix() -> CatalogMatch {
        CatalogMatch {
            canonical_id: CanonicalId(603),
            kind: MediaKind::Movie,
            title: "The Matrix".into(),
            year: Some(1999),
            popularity: 80.0,
        }
    }

    fn resolver(mock: MockCatalogLookup) -> (IdentityResolver, InMemoryIdentityCache) {
        let cache = InMemoryIdentityCache::new();
        (
            IdentityResolver::new(Arc::new(mock), Arc::new(cache.clone()), Duration::from_secs(5)),
            cache,
        )
    }

    fn request<'a>(
        source: &'a SourceId,
        identifiers: &'a [String],
        title: &'a str,
        year: Option<i32>,
    ) -> ResolveRequest<'a> {
        ResolveRequest {
            source_id: source,
            local_key: "42",
            kind: MediaKind::Movie,
            title,
            year,
            identifiers,
        }
    }

    #[tokio::test]
    async fn embedded_tmdb_id_needs_no_lookup() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_find_by_external_id().never();
        mock.expect_search().never();
        let (resolver, cache) = resolver(mock);
        let source = SourceId::from("plex-main");
        let ids = vec!["imdb://tt0133093".to_string(), "tmdb://603".to_string()];

        let resolved = resolver
            .resolve(&request(&source, &ids, "The Matrix", Some(1999)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.method, ResolutionMethod::Embedded);
        assert_eq!(resolved.identity.canonical_id, CanonicalId(603));
        assert_eq!(resolved.identity.imdb_id.as_deref(), Some("tt0133093"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn imdb_only_goes_through_find() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_find_by_external_id()
            .with(eq(ExternalId::Imdb("tt0133093".into())))
            .times(1)
            .returning(|_| Ok(vec![matrix()]));
        let (resolver, _) = resolver(mock);
        let source = SourceId::from("plex-main");
        let ids = vec!["com.plexapp.agents.imdb://tt0133093?lang=en".to_string()];

        let resolved = resolver
            .resolve(&request(&source, &ids, "The Matrix", Some(1999)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.method, ResolutionMethod::ExternalId);

        // Second call is served from the cache; the mock allows one find only.
        let again = resolver
            .resolve(&request(&source, &ids, "The Matrix", Some(1999)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.method, ResolutionMethod::Cached);
        assert!(!again.is_new());
    }

    #[tokio::test]
    async fn cross_kind_find_result_keeps_catalog_kind() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_find_by_external_id().returning(|_| {
            Ok(vec![CatalogMatch {
                canonical_id: CanonicalId(1399),
                kind: MediaKind::Series,
                title: "Game of Thrones".into(),
                year: Some(2011),
                popularity: 300.0,
            }])
        });
        let (resolver, _) = resolver(mock);
        let source = SourceId::from("plex-main");
        let ids = vec!["tvdb://121361".to_string()];
        let resolved = resolver
            .resolve(&request(&source, &ids, "Game of Thrones", None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.identity.kind, MediaKind::Series);
        assert_eq!(resolved.identity.tvdb_id, Some(121361));
    }

    #[tokio::test]
    async fn empty_year_search_retries_without_year() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_search()
            .with(eq(MediaKind::Movie), eq("Dune"), eq(Some(2022)))
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        mock.expect_search()
            .with(eq(MediaKind::Movie), eq("Dune"), eq(None::<i32>))
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![CatalogMatch {
                    canonical_id: CanonicalId(438631),
                    kind: MediaKind::Movie,
                    title: "Dune".into(),
                    year: Some(2021),
                    popularity: 120.0,
                }])
            });
        let (resolver, _) = resolver(mock);
        let source = SourceId::from("plex-main");
        let resolved = resolver
            .resolve(&request(&source, &[], "Dune", Some(2022)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.method, ResolutionMethod::TitleSearch);
        assert_eq!(resolved.identity.canonical_id, CanonicalId(438631));
    }

    #[tokio::test]
    async fn unmatched_title_is_a_miss_and_not_cached() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_search().returning(|_, _, _| Ok(Vec::new()));
        let (resolver, cache) = resolver(mock);
        let source = SourceId::from("plex-main");
        let resolved = resolver
            .resolve(&request(&source, &[], "Home Movies 2003", None))
            .await
            .unwrap();
        assert!(resolved.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn transient_catalog_failure_propagates() {
        let mut mock = MockCatalogLookup::new();
        mock.expect_search()
            .returning(|_, _, _| Err(ProviderError::RateLimited));
        let (resolver, _) = resolver(mock);
        let source = SourceId::from("plex-main");
        let err = resolver
            .resolve(&request(&source, &[], "Dune", None))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
