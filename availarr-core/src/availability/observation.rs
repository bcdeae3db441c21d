use std::collections::BTreeMap;

use availarr_model::{ContentIdentity, SourceId, Tier};
use chrono::{DateTime, Utc};

use super::rendition::TierSet;

/// Units observed per tier (episodes for a season, copies for a movie).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub standard: u32,
    pub high_tier: u32,
}

impl TierCounts {
    pub fn from_set(set: TierSet) -> Self {
        Self {
            standard: u32::from(set.standard),
            high_tier: u32::from(set.high_tier),
        }
    }

    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Standard => self.standard,
            Tier::HighTier => self.high_tier,
        }
    }

    pub fn max(self, other: TierCounts) -> TierCounts {
        TierCounts {
            standard: self.standard.max(other.standard),
            high_tier: self.high_tier.max(other.high_tier),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.standard == 0 && self.high_tier == 0
    }
}

/// What one or more sources currently hold for a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub identity: ContentIdentity,
    pub source_id: SourceId,
    pub source_key: String,
    pub added_at: Option<DateTime<Utc>>,
    /// Movie copies. Unused for series.
    pub movie: TierCounts,
    /// Distinct episodes per season number. Unused for movies.
    pub seasons: BTreeMap<i32, TierCounts>,
}

impl Observation {
    pub fn new(
        identity: ContentIdentity,
        source_id: SourceId,
        source_key: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            source_id,
            source_key: source_key.into(),
            added_at: None,
            movie: TierCounts::default(),
            seasons: BTreeMap::new(),
        }
    }

    pub fn with_added_at(mut self, added_at: Option<DateTime<Utc>>) -> Self {
        self.added_at = added_at;
        self
    }

    pub fn has_content(&self) -> bool {
        !self.movie.is_empty() || self.seasons.values().any(|c| !c.is_empty())
    }

    /// Folds another observation of the same title into this one, keeping
    /// the best count per season and tier.
    ///
    /// The source reference follows whichever side was added most recently.
    pub fn merge(&mut self, other: &Observation) {
        self.movie = self.movie.max(other.movie);
        for (season, counts) in &other.seasons {
            let entry = self.seasons.entry(*season).or_default();
            *entry = entry.max(*counts);
        }
        let other_is_newer = match (self.added_at, other.added_at) {
            (Some(mine), Some(theirs)) => theirs > mine,
            (None, Some(_)) => true,
            _ => false,
        };
        if other_is_newer {
            self.added_at = other.added_at;
            self.source_id = other.source_id.clone();
            self.source_key = other.source_key.clone();
        }
    }
}

/// Aired episode counts per season from the catalog. Only seasons with a
/// positive count are tracked for aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSeasons(pub BTreeMap<i32, u32>);

impl ExpectedSeasons {
    pub fn get(&self, season: i32) -> u32 {
        self.0.get(&season).copied().unwrap_or(0)
    }

    pub fn tracked(&self) -> impl Iterator<Item = i32> + '_ {
        self.0
            .iter()
            .filter(|(season, aired)| **season > 0 && **aired > 0)
            .map(|(season, _)| *season)
    }
}

impl FromIterator<(i32, u32)> for ExpectedSeasons {
    fn from_iter<I: IntoIterator<Item = (i32, u32)>>(iter: I) -> Self {
        ExpectedSeasons(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use availarr_model::{CanonicalId, MediaKind};
    use chrono::TimeZone;

    fn obs(source: &str, added_day: u32) -> Observation {
        Observation::new(
            ContentIdentity::new(CanonicalId(1399), MediaKind::Series),
            SourceId::from(source),
            format!("{source}-key"),
        )
        .with_added_at(Some(Utc.with_ymd_and_hms(2024, 1, added_day, 0, 0, 0).unwrap()))
    }

    #[test]
    fn merge_keeps_best_counts_per_season() {
        let mut first = obs("plex", 1);
        first.seasons.insert(1, TierCounts { standard: 10, high_tier: 0 });
        first.seasons.insert(2, TierCounts { standard: 2, high_tier: 0 });

        let mut second = obs("jellyfin", 2);
        second.seasons.insert(1, TierCounts { standard: 4, high_tier: 10 });
        second.seasons.insert(3, TierCounts { standard: 1, high_tier: 0 });

        first.merge(&second);
        assert_eq!(first.seasons[&1], TierCounts { standard: 10, high_tier: 10 });
        assert_eq!(first.seasons[&2].standard, 2);
        assert_eq!(first.seasons[&3].standard, 1);
        assert_eq!(first.source_id.as_str(), "jellyfin");
    }

    #[test]
    fn merge_keeps_source_of_newer_item() {
        let mut newer = obs("plex", 5);
        let older = obs("jellyfin", 1);
        newer.merge(&older);
        assert_eq!(newer.source_id.as_str(), "plex");
    }

    #[test]
    fn specials_and_unaired_seasons_are_untracked() {
        let expected: ExpectedSeasons = [(0, 4), (1, 10), (2, 0), (3, 6)].into_iter().collect();
        assert_eq!(expected.tracked().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(expected.get(7), 0);
    }
}
