mod support;

use availarr_core::persistence::StatusStore;
use availarr_core::sources::LibraryKind;
use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, CanonicalId, ContentIdentity,
    MediaKind, SeasonRecord, Tier,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use support::{FakeCatalog, FakeSource, Harness, hd, movie, show};

fn processing(kind: MediaKind, id: i64, tiers: &[Tier]) -> AvailabilityView {
    let identity = ContentIdentity::new(CanonicalId(id), kind);
    let mut record = AvailabilityRecord::new(&identity, Utc::now());
    for tier in tiers {
        record.set_status(*tier, AvailabilityStatus::Processing);
    }
    AvailabilityView {
        record,
        seasons: Vec::new(),
    }
}

fn empty_source() -> FakeSource {
    let source = FakeSource::new("plex-main");
    source.add_library("1", LibraryKind::Movie);
    source
}

#[tokio::test]
async fn fulfillment_cache_promotes_and_emits_once() {
    let h = Harness::new(vec![empty_source()], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 603, &[Tier::Standard]))
        .await;
    let request = h
        .requests
        .submit(MediaKind::Movie, CanonicalId(603), Tier::Standard, Vec::new())
        .await;
    h.fulfillment
        .mark_complete(MediaKind::Movie, CanonicalId(603), Tier::Standard)
        .await;
    let cancel = CancellationToken::new();

    let first = h.safety_net.run_pass(&cancel).await.unwrap();
    assert_eq!(first.examined, 1);
    assert_eq!(first.updated_count, 1);
    assert_eq!(first.events_emitted, 1);
    assert!(first.errors.is_empty());

    let view = h.view(MediaKind::Movie, 603).await;
    assert_eq!(view.record.status, AvailabilityStatus::Available);
    assert_eq!(view.record.status_high_tier, AvailabilityStatus::Unknown);

    let second = h.safety_net.run_pass(&cancel).await.unwrap();
    assert_eq!(second.examined, 0);
    assert_eq!(second.events_emitted, 0);

    let events = h.events.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, request);
}

#[tokio::test]
async fn targeted_lookup_corroborates_a_series() {
    let source = FakeSource::new("jelly");
    source.add_library("tv", LibraryKind::Series);
    source.add_root("tv", show("s1399", "Game of Thrones", &["tmdb://1399"]));
    source.add_season("tv", "s1399", 1, vec![vec![hd()]; 10]);
    source.add_season("tv", "s1399", 2, vec![vec![hd()]; 2]);
    let catalog = FakeCatalog::new();
    catalog.add_series(1399, &[(1, 10, 0), (2, 10, 0)]);
    let h = Harness::new(vec![source], catalog);
    h.store
        .insert(processing(MediaKind::Series, 1399, &[Tier::Standard]))
        .await;
    let season_one = h
        .requests
        .submit(MediaKind::Series, CanonicalId(1399), Tier::Standard, vec![1])
        .await;
    let whole_show = h
        .requests
        .submit(MediaKind::Series, CanonicalId(1399), Tier::Standard, Vec::new())
        .await;

    let summary = h
        .safety_net
        .run_pass(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.updated_count, 1);
    assert_eq!(summary.events_emitted, 1);
    let view = h.view(MediaKind::Series, 1399).await;
    assert_eq!(view.record.status, AvailabilityStatus::PartiallyAvailable);
    assert_eq!(view.record.source_key.as_deref(), Some("s1399"));

    let events = h.events.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, season_one);
    assert!(
        h.requests
            .get(whole_show)
            .await
            .unwrap()
            .status
            .is_outstanding()
    );
}

#[tokio::test]
async fn nothing_found_leaves_the_record_processing() {
    let h = Harness::new(vec![empty_source()], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 550, &[Tier::Standard, Tier::HighTier]))
        .await;

    let summary = h
        .safety_net
        .run_pass(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.updated_count, 0);
    assert_eq!(h.store.write_count(), 0);
    let view = h.view(MediaKind::Movie, 550).await;
    assert_eq!(view.record.status, AvailabilityStatus::Processing);
    assert_eq!(view.record.status_high_tier, AvailabilityStatus::Processing);
}

#[tokio::test]
async fn promoted_tier_survives_corroboration_of_the_other() {
    let source = empty_source();
    source.add_root("1", movie("m603", "The Matrix", 1999, &["tmdb://603"], vec![hd()]));
    let h = Harness::new(vec![source], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 603, &[Tier::Standard, Tier::HighTier]))
        .await;
    // The 4K download finished; the source only holds the 1080p copy.
    h.fulfillment
        .mark_complete(MediaKind::Movie, CanonicalId(603), Tier::HighTier)
        .await;

    let summary = h
        .safety_net
        .run_pass(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.updated_count, 1);
    let view = h.view(MediaKind::Movie, 603).await;
    assert_eq!(view.record.status, AvailabilityStatus::Available);
    assert_eq!(view.record.status_high_tier, AvailabilityStatus::Available);
}

#[tokio::test]
async fn deleted_records_are_not_examined() {
    let h = Harness::new(vec![empty_source()], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 603, &[Tier::Standard]))
        .await;
    h.fulfillment
        .mark_complete(MediaKind::Movie, CanonicalId(603), Tier::Standard)
        .await;
    assert!(
        h.store
            .mark_deleted(MediaKind::Movie, CanonicalId(603))
            .await
            .unwrap()
    );

    let summary = h
        .safety_net
        .run_pass(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.examined, 0);
    assert!(h.view(MediaKind::Movie, 603).await.record.is_deleted());
}

#[tokio::test]
async fn season_records_are_promoted_with_the_title() {
    let h = Harness::new(vec![empty_source()], FakeCatalog::new());
    let mut view = processing(MediaKind::Series, 1399, &[Tier::Standard]);
    let mut season = SeasonRecord::new(view.record.id, 1, Utc::now());
    season.set_status(Tier::Standard, AvailabilityStatus::PartiallyAvailable);
    view.seasons.push(season);
    h.store.insert(view).await;
    h.fulfillment
        .mark_complete(MediaKind::Series, CanonicalId(1399), Tier::Standard)
        .await;

    h.safety_net
        .run_pass(&CancellationToken::new())
        .await
        .unwrap();

    let view = h.view(MediaKind::Series, 1399).await;
    assert_eq!(view.record.status, AvailabilityStatus::Available);
    assert_eq!(view.seasons[0].status, AvailabilityStatus::Available);
}

#[tokio::test]
async fn cancelled_pass_examines_nothing() {
    let h = Harness::new(vec![empty_source()], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 603, &[Tier::Standard]))
        .await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = h.safety_net.run_pass(&cancel).await.unwrap();
    assert_eq!(summary.examined, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scan_racing_a_safety_pass_emits_once() {
    let source = empty_source();
    source.add_root("1", movie("m603", "The Matrix", 1999, &["tmdb://603"], vec![hd()]));
    let h = Harness::new(vec![source], FakeCatalog::new());
    h.store
        .insert(processing(MediaKind::Movie, 603, &[Tier::Standard]))
        .await;
    let request = h
        .requests
        .submit(MediaKind::Movie, CanonicalId(603), Tier::Standard, Vec::new())
        .await;
    h.fulfillment
        .mark_complete(MediaKind::Movie, CanonicalId(603), Tier::Standard)
        .await;
    let cancel = CancellationToken::new();

    let (scanned, swept) = tokio::join!(
        h.orchestrator.scan(&[], false, &cancel),
        h.safety_net.run_pass(&cancel),
    );
    let scanned = scanned.unwrap();
    let swept = swept.unwrap();

    assert_eq!(scanned.error_count(), 0);
    assert!(swept.errors.is_empty());
    let view = h.view(MediaKind::Movie, 603).await;
    assert_eq!(view.record.status, AvailabilityStatus::Available);

    let events = h.events.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, request);
    assert!(h.reconciler.locks().is_empty());
}
