//! Status rules for seasons, shows and movies.
//!
//! All functions are pure and idempotent: the same observed counts always
//! produce the same statuses, so re-running a pass over unchanged content
//! never moves a record.

use availarr_model::AvailabilityStatus;
use chrono::NaiveDate;

/// One episode from the catalog's season listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeAirDate {
    pub episode_number: i32,
    pub air_date: Option<NaiveDate>,
}

/// Episodes that have aired on or before `today`. Undated episodes are
/// treated as unaired.
pub fn expected_aired_count(episodes: &[EpisodeAirDate], today: NaiveDate) -> u32 {
    let aired = episodes
        .iter()
        .filter(|ep| ep.air_date.is_some_and(|date| date <= today))
        .count();
    u32::try_from(aired).unwrap_or(u32::MAX)
}

fn tier_status(observed: u32, expected: u32) -> AvailabilityStatus {
    if expected == 0 || observed == 0 {
        AvailabilityStatus::Unknown
    } else if observed >= expected {
        AvailabilityStatus::Available
    } else {
        AvailabilityStatus::PartiallyAvailable
    }
}

/// Returns `(standard, high_tier)` statuses for one season.
pub fn reconcile_season(
    observed_standard: u32,
    observed_high: u32,
    expected_aired: u32,
) -> (AvailabilityStatus, AvailabilityStatus) {
    (
        tier_status(observed_standard, expected_aired),
        tier_status(observed_high, expected_aired),
    )
}

/// A movie is a single subdivision with one expected unit.
pub fn reconcile_movie(
    observed_standard: u32,
    observed_high: u32,
) -> (AvailabilityStatus, AvailabilityStatus) {
    reconcile_season(observed_standard, observed_high, 1)
}

/// Aggregates tracked season statuses into a show status for one tier.
///
/// `outstanding` is true while a request for the title is still waiting
/// (the prior status was pending or processing).
pub fn reconcile_show(season_statuses: &[AvailabilityStatus], outstanding: bool) -> AvailabilityStatus {
    if !season_statuses.is_empty()
        && season_statuses
            .iter()
            .all(|s| *s == AvailabilityStatus::Available)
    {
        return AvailabilityStatus::Available;
    }
    if season_statuses.iter().any(AvailabilityStatus::has_content) {
        return AvailabilityStatus::PartiallyAvailable;
    }
    if outstanding {
        AvailabilityStatus::Processing
    } else {
        AvailabilityStatus::Unknown
    }
}

/// Keeps an outstanding prior status when nothing was observed.
///
/// A computed `unknown` only means "no content seen"; it must not erase the
/// fact that a request is pending or being processed.
pub fn settle(computed: AvailabilityStatus, prior: AvailabilityStatus) -> AvailabilityStatus {
    if computed == AvailabilityStatus::Unknown && prior.is_outstanding() {
        prior
    } else {
        computed
    }
}
