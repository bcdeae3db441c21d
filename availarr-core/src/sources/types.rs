use std::fmt;
use std::str::FromStr;

use availarr_model::{ContentIdentity, MediaKind, SourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::Rendition;
use crate::identity::parse_identifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plex,
    Jellyfin,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Plex => f.write_str("plex"),
            SourceKind::Jellyfin => f.write_str("jellyfin"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plex" => Ok(SourceKind::Plex),
            "jellyfin" | "emby" => Ok(SourceKind::Jellyfin),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// Static facts about a configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    /// Everything on this source counts toward the high tier.
    pub high_tier: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryKind {
    Movie,
    Series,
    Other(String),
}

impl LibraryKind {
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            LibraryKind::Movie => Some(MediaKind::Movie),
            LibraryKind::Series => Some(MediaKind::Series),
            LibraryKind::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLibrary {
    pub key: String,
    pub title: String,
    pub kind: LibraryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Movie,
    Show,
    Season,
    Episode,
    Other,
}

/// A library entry as the source reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryItem {
    pub key: String,
    pub kind: Option<ItemKind>,
    pub title: String,
    pub year: Option<i32>,
    /// Season number for seasons, episode number for episodes.
    pub index: Option<i32>,
    /// Season number of an episode.
    pub parent_index: Option<i32>,
    pub parent_key: Option<String>,
    pub grandparent_key: Option<String>,
    /// Raw vendor identifiers (`tmdb://603`, legacy agent guids, ...).
    pub identifiers: Vec<String>,
    pub renditions: Vec<Rendition>,
    pub added_at: Option<DateTime<Utc>>,
}

impl LibraryItem {
    /// Key of the movie or show this item belongs to.
    pub fn root_key(&self) -> Option<&str> {
        match self.kind? {
            ItemKind::Movie | ItemKind::Show => Some(self.key.as_str()),
            ItemKind::Season => self.parent_key.as_deref(),
            ItemKind::Episode => self
                .grandparent_key
                .as_deref()
                .or(self.parent_key.as_deref()),
            ItemKind::Other => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, Some(ItemKind::Movie | ItemKind::Show))
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        match self.kind? {
            ItemKind::Movie => Some(MediaKind::Movie),
            ItemKind::Show | ItemKind::Season | ItemKind::Episode => Some(MediaKind::Series),
            ItemKind::Other => None,
        }
    }

    /// True when the item's identifiers point at `identity`. Items carrying
    /// no external id at all are given the benefit of the doubt.
    pub fn carries(&self, identity: &ContentIdentity) -> bool {
        let parsed = parse_identifiers(&self.identifiers);
        if parsed.is_empty() {
            return true;
        }
        parsed.tmdb == Some(identity.canonical_id.get())
            || (parsed.imdb.is_some() && parsed.imdb == identity.imdb_id)
            || (parsed.tvdb.is_some() && parsed.tvdb == identity.tvdb_id)
    }

    /// Season number of a season or episode.
    pub fn season_number(&self) -> Option<i32> {
        match self.kind? {
            ItemKind::Season => self.index,
            ItemKind::Episode => self.parent_index,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub size: usize,
    pub added_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryPage {
    pub items: Vec<LibraryItem>,
    /// Total the source reports for the whole listing.
    pub total: usize,
}
