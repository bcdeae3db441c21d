//! Builds observations from what a source reports for one title.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use availarr_model::{CanonicalId, ContentIdentity, MediaKind};
use chrono::NaiveDate;
use tracing::debug;

use crate::availability::{
    ExpectedSeasons, Observation, RenditionPolicy, TierCounts, classify_item,
    expected_aired_count,
};
use crate::providers::{CatalogLookup, ProviderError};
use crate::sources::{ItemKind, LibraryItem, MediaSource, SourceError};
use crate::timeout::bounded;

/// Observes a root item (movie or show) on `source`.
///
/// Movies are classified from their renditions, fetching the full item when
/// the listing carried none. Shows are walked season by season and count
/// distinct episodes per tier.
pub async fn observe_item(
    source: &dyn MediaSource,
    item: &LibraryItem,
    identity: ContentIdentity,
    policy: &RenditionPolicy,
    timeout: Duration,
) -> Result<Observation, SourceError> {
    let descriptor = source.descriptor();
    let mut observation = Observation::new(identity, descriptor.id.clone(), item.key.clone())
        .with_added_at(item.added_at);

    match observation.identity.kind {
        MediaKind::Movie => {
            let tiers = if item.renditions.is_empty() {
                let full = bounded(timeout, "fetch_item", source.fetch_item(&item.key)).await?;
                if observation.added_at.is_none() {
                    observation.added_at = full.added_at;
                }
                classify_item(&full.renditions, policy, descriptor.high_tier)
            } else {
                classify_item(&item.renditions, policy, descriptor.high_tier)
            };
            observation.movie = TierCounts::from_set(tiers);
        }
        MediaKind::Series => {
            observation.seasons =
                observe_seasons(source, &item.key, policy, descriptor.high_tier, timeout).await?;
        }
    }
    Ok(observation)
}

async fn observe_seasons(
    source: &dyn MediaSource,
    show_key: &str,
    policy: &RenditionPolicy,
    high_tier_source: bool,
    timeout: Duration,
) -> Result<BTreeMap<i32, TierCounts>, SourceError> {
    let children = bounded(timeout, "fetch_children", source.fetch_children(show_key)).await?;
    let mut seasons = BTreeMap::new();

    for season in children
        .into_iter()
        .filter(|c| c.kind == Some(ItemKind::Season))
    {
        let Some(number) = season.season_number().filter(|n| *n > 0) else {
            debug!(show = show_key, season = %season.key, "skipping unnumbered or special season");
            continue;
        };
        let episodes =
            bounded(timeout, "fetch_children", source.fetch_children(&season.key)).await?;

        let mut standard = HashSet::new();
        let mut high = HashSet::new();
        for episode in episodes
            .iter()
            .filter(|e| e.kind == Some(ItemKind::Episode))
        {
            let tiers = classify_item(&episode.renditions, policy, high_tier_source);
            // Multi-file episodes count once.
            let id = episode
                .index
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("key:{}", episode.key));
            if tiers.standard {
                standard.insert(id.clone());
            }
            if tiers.high_tier {
                high.insert(id);
            }
        }

        let counts = TierCounts {
            standard: u32::try_from(standard.len()).unwrap_or(u32::MAX),
            high_tier: u32::try_from(high.len()).unwrap_or(u32::MAX),
        };
        let entry: &mut TierCounts = seasons.entry(number).or_default();
        *entry = entry.max(counts);
    }
    Ok(seasons)
}

/// Aired episode counts per season, as of `today`.
pub async fn expected_seasons(
    catalog: &dyn CatalogLookup,
    id: CanonicalId,
    today: NaiveDate,
    timeout: Duration,
) -> Result<ExpectedSeasons, ProviderError> {
    let seasons = bounded(timeout, "season_episodes", catalog.season_episodes(id)).await?;
    Ok(seasons
        .iter()
        .map(|s| (s.season_number, expected_aired_count(&s.episodes, today)))
        .collect())
}
