use async_trait::async_trait;
use availarr_model::{CanonicalId, MediaKind};

use super::ProviderError;
use crate::availability::EpisodeAirDate;

/// Secondary identifier accepted by the catalog's find endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId {
    Imdb(String),
    Tvdb(i64),
}

impl ExternalId {
    pub fn source_name(&self) -> &'static str {
        match self {
            ExternalId::Imdb(_) => "imdb_id",
            ExternalId::Tvdb(_) => "tvdb_id",
        }
    }

    pub fn value(&self) -> String {
        match self {
            ExternalId::Imdb(id) => id.clone(),
            ExternalId::Tvdb(id) => id.to_string(),
        }
    }
}

/// A catalog title returned by a find or search call.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub canonical_id: CanonicalId,
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<i32>,
    pub popularity: f64,
}

/// Episode air dates for one season of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonEpisodes {
    pub season_number: i32,
    pub episodes: Vec<EpisodeAirDate>,
}

/// Lookups against the canonical catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Titles carrying the given external id, of any kind.
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Vec<CatalogMatch>, ProviderError>;

    /// Title search, ordered by catalog relevance.
    async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<CatalogMatch>, ProviderError>;

    /// Every regular season with its episode air dates. Specials are omitted.
    async fn season_episodes(
        &self,
        series: CanonicalId,
    ) -> Result<Vec<SeasonEpisodes>, ProviderError>;
}
