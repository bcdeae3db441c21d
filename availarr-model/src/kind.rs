use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::CanonicalId;

/// Media kind discriminator. TMDB ids are only unique within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }

    /// Key used by the per-title lock map, e.g. `movie-603`.
    pub fn lock_key(&self, id: CanonicalId) -> String {
        format!("{}-{}", self.as_str(), id)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "series" | "tv" | "show" | "shows" => Ok(MediaKind::Series),
            other => Err(ModelError::UnknownMediaKind(other.to_string())),
        }
    }
}

/// Rendition class tracked with its own status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Tier {
    Standard,
    HighTier,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Standard, Tier::HighTier];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::HighTier => "high_tier",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Tier::HighTier)
    }

    pub fn from_high_flag(high: bool) -> Self {
        if high { Tier::HighTier } else { Tier::Standard }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
