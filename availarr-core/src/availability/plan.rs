use std::collections::{BTreeMap, BTreeSet};

use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, MediaKind, SeasonRecord, Tier,
};
use chrono::{DateTime, Utc};

use super::observation::{ExpectedSeasons, Observation};
use super::state_machine::{reconcile_movie, reconcile_season, reconcile_show, settle};

/// Next persisted state of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledState {
    pub record: AvailabilityRecord,
    pub seasons: Vec<SeasonRecord>,
}

impl ReconciledState {
    /// True when persisting this state would change anything.
    pub fn differs_from(&self, prior: Option<&AvailabilityView>) -> bool {
        let Some(prior) = prior else {
            return true;
        };
        if !self.record.same_state(&prior.record) || self.seasons.len() != prior.seasons.len() {
            return true;
        }
        let before: BTreeMap<i32, (AvailabilityStatus, AvailabilityStatus)> = prior
            .seasons
            .iter()
            .map(|s| (s.season_number, (s.status, s.status_high_tier)))
            .collect();
        self.seasons.iter().any(|s| {
            before.get(&s.season_number) != Some(&(s.status, s.status_high_tier))
        })
    }

    /// Tiers whose title-level status moved up to a status with content.
    pub fn promoted_tiers(&self, prior: Option<&AvailabilityView>) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|tier| {
                let before = prior
                    .map(|p| p.record.status_for(*tier))
                    .unwrap_or_default();
                let season_promoted = self.seasons.iter().any(|season| {
                    let season_before = prior
                        .and_then(|p| {
                            p.seasons
                                .iter()
                                .find(|s| s.season_number == season.season_number)
                        })
                        .map(|s| s.status_for(*tier))
                        .unwrap_or_default();
                    season_before.is_promotion_to(season.status_for(*tier))
                });
                before.is_promotion_to(self.record.status_for(*tier)) || season_promoted
            })
            .collect()
    }

    pub fn into_view(self) -> AvailabilityView {
        AvailabilityView {
            record: self.record,
            seasons: self.seasons,
        }
    }
}

/// Recomputes the statuses of `tiers` from `observation`.
///
/// Statuses are derived from the observed counts alone, so a title whose
/// content really shrank is downgraded. Tiers outside `tiers` keep their
/// prior values. A deleted record is returned untouched.
pub fn plan_reconciliation(
    prior: Option<&AvailabilityView>,
    observation: &Observation,
    expected: &ExpectedSeasons,
    tiers: &[Tier],
    now: DateTime<Utc>,
) -> ReconciledState {
    let mut record = prior
        .map(|p| p.record.clone())
        .unwrap_or_else(|| AvailabilityRecord::new(&observation.identity, now));

    if record.is_deleted() {
        return ReconciledState {
            record,
            seasons: prior.map(|p| p.seasons.clone()).unwrap_or_default(),
        };
    }

    let seasons = match record.kind {
        MediaKind::Movie => {
            let (standard, high) =
                reconcile_movie(observation.movie.standard, observation.movie.high_tier);
            for tier in tiers {
                let computed = match tier {
                    Tier::Standard => standard,
                    Tier::HighTier => high,
                };
                record.set_status(*tier, settle(computed, record.status_for(*tier)));
            }
            prior.map(|p| p.seasons.clone()).unwrap_or_default()
        }
        MediaKind::Series => {
            let seasons = plan_seasons(&record, prior, observation, expected, tiers, now);
            for tier in tiers {
                let tracked: Vec<AvailabilityStatus> = expected
                    .tracked()
                    .map(|n| {
                        seasons
                            .iter()
                            .find(|s| s.season_number == n)
                            .map(|s| s.status_for(*tier))
                            .unwrap_or_default()
                    })
                    .collect();
                let prior_status = record.status_for(*tier);
                let show = reconcile_show(&tracked, prior_status.is_outstanding());
                record.set_status(*tier, settle(show, prior_status));
            }
            seasons
        }
    };

    if observation.has_content() {
        record.source_id = Some(observation.source_id.clone());
        record.source_key = Some(observation.source_key.clone());
        record.last_added_at = match (record.last_added_at, observation.added_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    if prior.is_none_or(|p| !record.same_state(&p.record)) {
        record.updated_at = now;
    }

    ReconciledState { record, seasons }
}

fn plan_seasons(
    record: &AvailabilityRecord,
    prior: Option<&AvailabilityView>,
    observation: &Observation,
    expected: &ExpectedSeasons,
    tiers: &[Tier],
    now: DateTime<Utc>,
) -> Vec<SeasonRecord> {
    let prior_seasons: BTreeMap<i32, &SeasonRecord> = prior
        .map(|p| p.seasons.iter().map(|s| (s.season_number, s)).collect())
        .unwrap_or_default();

    let numbers: BTreeSet<i32> = expected
        .0
        .keys()
        .chain(observation.seasons.keys())
        .chain(prior_seasons.keys())
        .copied()
        .filter(|n| *n > 0)
        .collect();

    numbers
        .into_iter()
        .map(|number| {
            let mut season = prior_seasons
                .get(&number)
                .map(|s| (*s).clone())
                .unwrap_or_else(|| SeasonRecord::new(record.id, number, now));
            season.record_id = record.id;
            let counts = observation.seasons.get(&number).copied().unwrap_or_default();
            let (standard, high) =
                reconcile_season(counts.standard, counts.high_tier, expected.get(number));
            let before = (season.status, season.status_high_tier);
            for tier in tiers {
                let computed = match tier {
                    Tier::Standard => standard,
                    Tier::HighTier => high,
                };
                season.set_status(*tier, settle(computed, season.status_for(*tier)));
            }
            if before != (season.status, season.status_high_tier) {
                season.updated_at = now;
            }
            season
        })
        .collect()
}

/// Marks `tier` available on the title and every known season.
pub fn promote_tier(prior: &AvailabilityView, tier: Tier, now: DateTime<Utc>) -> ReconciledState {
    let mut record = prior.record.clone();
    let mut seasons = prior.seasons.clone();
    if record.is_deleted() {
        return ReconciledState { record, seasons };
    }
    if record.status_for(tier) != AvailabilityStatus::Available {
        record.set_status(tier, AvailabilityStatus::Available);
        record.updated_at = now;
    }
    for season in &mut seasons {
        if season.status_for(tier) != AvailabilityStatus::Available {
            season.set_status(tier, AvailabilityStatus::Available);
            season.updated_at = now;
        }
    }
    ReconciledState { record, seasons }
}
