use chrono::{DateTime, Utc};

use crate::identity::ContentIdentity;
use crate::ids::{CanonicalId, RecordId, SourceId};
use crate::kind::{MediaKind, Tier};
use crate::status::AvailabilityStatus;

/// Persisted availability of one title, keyed by `(canonical_id, kind)`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvailabilityRecord {
    pub id: RecordId,
    pub canonical_id: CanonicalId,
    pub kind: MediaKind,
    pub status: AvailabilityStatus,
    pub status_high_tier: AvailabilityStatus,
    /// Source that produced the most recent observation.
    pub source_id: Option<SourceId>,
    /// Source-local key (Plex rating key, Jellyfin item id) last observed.
    pub source_key: Option<String>,
    pub last_added_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityRecord {
    pub fn new(identity: &ContentIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            canonical_id: identity.canonical_id,
            kind: identity.kind,
            status: AvailabilityStatus::Unknown,
            status_high_tier: AvailabilityStatus::Unknown,
            source_id: None,
            source_key: None,
            last_added_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status_for(&self, tier: Tier) -> AvailabilityStatus {
        match tier {
            Tier::Standard => self.status,
            Tier::HighTier => self.status_high_tier,
        }
    }

    pub fn set_status(&mut self, tier: Tier, status: AvailabilityStatus) {
        match tier {
            Tier::Standard => self.status = status,
            Tier::HighTier => self.status_high_tier = status,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    pub fn lock_key(&self) -> String {
        self.kind.lock_key(self.canonical_id)
    }

    /// Compares the fields reconciliation is allowed to change.
    pub fn same_state(&self, other: &AvailabilityRecord) -> bool {
        self.status == other.status
            && self.status_high_tier == other.status_high_tier
            && self.source_id == other.source_id
            && self.source_key == other.source_key
            && self.last_added_at == other.last_added_at
    }
}

/// Per-season availability; movies carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeasonRecord {
    pub record_id: RecordId,
    pub season_number: i32,
    pub status: AvailabilityStatus,
    pub status_high_tier: AvailabilityStatus,
    pub updated_at: DateTime<Utc>,
}

impl SeasonRecord {
    pub fn new(record_id: RecordId, season_number: i32, now: DateTime<Utc>) -> Self {
        Self {
            record_id,
            season_number,
            status: AvailabilityStatus::Unknown,
            status_high_tier: AvailabilityStatus::Unknown,
            updated_at: now,
        }
    }

    pub fn status_for(&self, tier: Tier) -> AvailabilityStatus {
        match tier {
            Tier::Standard => self.status,
            Tier::HighTier => self.status_high_tier,
        }
    }

    pub fn set_status(&mut self, tier: Tier, status: AvailabilityStatus) {
        match tier {
            Tier::Standard => self.status = status,
            Tier::HighTier => self.status_high_tier = status,
        }
    }
}

/// Answer to a status query: the title record and its seasons.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvailabilityView {
    pub record: AvailabilityRecord,
    pub seasons: Vec<SeasonRecord>,
}
