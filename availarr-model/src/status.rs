use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Availability lattice shared by titles and seasons.
///
/// Ordered `Unknown < Pending < Processing < PartiallyAvailable < Available`.
/// `Deleted` sits outside the order: it is only ever set administratively and
/// the engine never moves a record out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AvailabilityStatus {
    #[default]
    Unknown,
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
    Deleted,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Unknown => "unknown",
            AvailabilityStatus::Pending => "pending",
            AvailabilityStatus::Processing => "processing",
            AvailabilityStatus::PartiallyAvailable => "partially_available",
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Deleted => "deleted",
        }
    }

    /// Position in the lattice; `None` for `Deleted`.
    pub fn rank(&self) -> Option<u8> {
        match self {
            AvailabilityStatus::Unknown => Some(0),
            AvailabilityStatus::Pending => Some(1),
            AvailabilityStatus::Processing => Some(2),
            AvailabilityStatus::PartiallyAvailable => Some(3),
            AvailabilityStatus::Available => Some(4),
            AvailabilityStatus::Deleted => None,
        }
    }

    /// Some content has been observed locally.
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            AvailabilityStatus::PartiallyAvailable
                | AvailabilityStatus::Available
        )
    }

    /// A request exists and the content is on its way.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            AvailabilityStatus::Pending | AvailabilityStatus::Processing
        )
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, AvailabilityStatus::Deleted)
    }

    /// True when moving from `self` to `next` goes up the lattice into a
    /// state with local content.
    pub fn is_promotion_to(&self, next: AvailabilityStatus) -> bool {
        if !next.has_content() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvailabilityStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(AvailabilityStatus::Unknown),
            "pending" => Ok(AvailabilityStatus::Pending),
            "processing" => Ok(AvailabilityStatus::Processing),
            "partially_available" => Ok(AvailabilityStatus::PartiallyAvailable),
            "available" => Ok(AvailabilityStatus::Available),
            "deleted" => Ok(AvailabilityStatus::Deleted),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}
