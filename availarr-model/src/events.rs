use chrono::{DateTime, Utc};

use crate::ids::{CanonicalId, RequestId};
use crate::kind::{MediaKind, Tier};

/// Emitted once per request when the content it asked for became available.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaAvailableEvent {
    pub request_id: RequestId,
    pub canonical_id: CanonicalId,
    pub kind: MediaKind,
    pub tier: Tier,
    pub seasons: Vec<i32>,
    pub occurred_at: DateTime<Utc>,
}
