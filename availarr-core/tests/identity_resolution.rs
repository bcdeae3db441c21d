mod support;

use std::sync::Arc;
use std::time::Duration;

use availarr_core::identity::{
    CacacheIdentityCache, IdentityCache, IdentityResolver, InMemoryIdentityCache,
    ResolutionMethod, ResolveRequest,
};
use availarr_core::providers::CatalogMatch;
use availarr_model::{CanonicalId, MediaKind, SourceId};

use support::FakeCatalog;

fn candidate(id: i64, kind: MediaKind, title: &str, year: Option<i32>) -> CatalogMatch {
    CatalogMatch {
        canonical_id: CanonicalId(id),
        kind,
        title: title.into(),
        year,
        popularity: 40.0,
    }
}

fn request<'a>(
    source: &'a SourceId,
    key: &'a str,
    title: &'a str,
    year: Option<i32>,
    identifiers: &'a [String],
) -> ResolveRequest<'a> {
    ResolveRequest {
        source_id: source,
        local_key: key,
        kind: MediaKind::Movie,
        title,
        year,
        identifiers,
    }
}

#[tokio::test]
async fn dune_is_accepted_and_second_call_is_free() {
    let catalog = Arc::new(FakeCatalog::new());
    catalog.add_search("Dune", candidate(841, MediaKind::Movie, "Dune", Some(1984)));
    catalog.add_search("Dune", candidate(438631, MediaKind::Movie, "Dune", Some(2021)));
    let resolver = IdentityResolver::new(
        catalog.clone(),
        Arc::new(InMemoryIdentityCache::new()),
        Duration::from_secs(5),
    );
    let source = SourceId::new("plex-main");

    let first = resolver
        .resolve(&request(&source, "77", "Dune", Some(2021), &[]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.identity.canonical_id, CanonicalId(438631));
    assert_eq!(first.method, ResolutionMethod::TitleSearch);
    let lookups = catalog.lookups();

    let second = resolver
        .resolve(&request(&source, "77", "Dune", Some(2021), &[]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.method, ResolutionMethod::Cached);
    assert_eq!(second.identity, first.identity);
    assert_eq!(catalog.lookups(), lookups);
}

#[tokio::test]
async fn weak_candidates_are_rejected() {
    let catalog = Arc::new(FakeCatalog::new());
    catalog.add_search("Dune", candidate(9999, MediaKind::Movie, "Arrakis", Some(2010)));
    let resolver = IdentityResolver::new(
        catalog,
        Arc::new(InMemoryIdentityCache::new()),
        Duration::from_secs(5),
    );
    let source = SourceId::new("plex-main");

    let miss = resolver
        .resolve(&request(&source, "12", "Dune", Some(2021), &[]))
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn legacy_imdb_guid_resolves_through_find() {
    let catalog = Arc::new(FakeCatalog::new());
    catalog.add_find(
        "tt0133093",
        candidate(603, MediaKind::Movie, "The Matrix", Some(1999)),
    );
    let resolver = IdentityResolver::new(
        catalog.clone(),
        Arc::new(InMemoryIdentityCache::new()),
        Duration::from_secs(5),
    );
    let source = SourceId::new("plex-main");
    let ids = vec!["com.plexapp.agents.imdb://tt0133093?lang=en".to_string()];

    let found = resolver
        .resolve(&request(&source, "42", "The Matrix", Some(1999), &ids))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.identity.canonical_id, CanonicalId(603));
    assert_eq!(found.identity.imdb_id.as_deref(), Some("tt0133093"));
    assert_eq!(found.method, ResolutionMethod::ExternalId);
    assert_eq!(catalog.lookups(), 1);
}

#[tokio::test]
async fn on_disk_cache_survives_a_new_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let source = SourceId::new("jelly");
    let ids = vec!["tmdb://603".to_string()];

    let first = IdentityResolver::new(
        Arc::new(FakeCatalog::new()),
        Arc::new(CacacheIdentityCache::new(dir.path())),
        Duration::from_secs(5),
    );
    let resolved = first
        .resolve(&request(&source, "abc", "The Matrix", Some(1999), &ids))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.method, ResolutionMethod::Embedded);

    let catalog = Arc::new(FakeCatalog::new());
    let cache = Arc::new(CacacheIdentityCache::new(dir.path()));
    let second = IdentityResolver::new(catalog.clone(), cache.clone(), Duration::from_secs(5));
    let hit = second.cached(&source, "abc").await.unwrap();
    assert_eq!(hit.canonical_id, CanonicalId(603));

    cache.invalidate(&source, "abc").await.unwrap();
    assert!(second.cached(&source, "abc").await.is_none());
    assert_eq!(catalog.lookups(), 0);
}
