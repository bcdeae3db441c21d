use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::{CanonicalId, RequestId};
use crate::kind::{MediaKind, Tier};

/// Lifecycle of a request as far as the engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestStatus {
    Pending,
    Processing,
    Available,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Available => "available",
            RequestStatus::Declined => "declined",
        }
    }

    pub fn is_outstanding(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Processing)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "processing" => Ok(RequestStatus::Processing),
            "available" => Ok(RequestStatus::Available),
            "declined" => Ok(RequestStatus::Declined),
            other => Err(ModelError::UnknownRequestStatus(other.to_string())),
        }
    }
}

/// A user's request for a title, as read from the request ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaRequest {
    pub id: RequestId,
    pub canonical_id: CanonicalId,
    pub kind: MediaKind,
    pub tier: Tier,
    /// Seasons the request needs. Empty means the whole title.
    pub seasons: Vec<i32>,
    pub status: RequestStatus,
}
