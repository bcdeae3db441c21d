use async_trait::async_trait;
use availarr_model::{CanonicalId, MediaKind};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{CatalogLookup, CatalogMatch, ExternalId, ProviderError, SeasonEpisodes};
use crate::availability::EpisodeAirDate;

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3/";

/// TMDB v3 client covering the find, search and season endpoints.
///
/// Accepts either a v3 API key (sent as the `api_key` query parameter) or a
/// v4 read access token (sent as a bearer token).
#[derive(Debug, Clone)]
pub struct TmdbCatalog {
    client: Client,
    base_url: Url,
    api_key: String,
    language: Option<String>,
}

impl TmdbCatalog {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, TMDB_API_BASE)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidApiKey);
        }
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ProviderError::ApiError(format!("invalid TMDB base url: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("availarr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            language: None,
        })
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    fn uses_bearer(&self) -> bool {
        // v4 tokens are JWTs; v3 keys are 32 hex characters.
        self.api_key.starts_with("eyJ")
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::ApiError(format!("invalid path {path}: {e}")))?;

        let mut request = self.client.get(url).query(query);
        if let Some(language) = &self.language {
            request = request.query(&[("language", language)]);
        }
        request = if self.uses_bearer() {
            request.bearer_auth(&self.api_key)
        } else {
            request.query(&[("api_key", &self.api_key)])
        };

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(ProviderError::InvalidApiKey),
            StatusCode::NOT_FOUND => return Err(ProviderError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(path, "TMDB rate limit hit");
                return Err(ProviderError::RateLimited);
            }
            status => {
                return Err(ProviderError::ApiError(format!(
                    "GET {path} returned {status}"
                )));
            }
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::ParseError(format!("{path}: {e}")))
    }
}

#[async_trait]
impl CatalogLookup for TmdbCatalog {
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Vec<CatalogMatch>, ProviderError> {
        let path = format!("find/{}", id.value());
        let found: FindResponse = self
            .get(&path, &[("external_source", id.source_name().to_string())])
            .await?;
        let mut matches: Vec<CatalogMatch> = found
            .movie_results
            .into_iter()
            .filter_map(MovieResult::into_match)
            .collect();
        matches.extend(found.tv_results.into_iter().filter_map(TvResult::into_match));
        debug!(external_id = %id.value(), matches = matches.len(), "TMDB find");
        Ok(matches)
    }

    async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<CatalogMatch>, ProviderError> {
        let mut query = vec![("query", title.to_string())];
        let matches = match kind {
            MediaKind::Movie => {
                if let Some(year) = year {
                    query.push(("year", year.to_string()));
                }
                let page: SearchResponse<MovieResult> = self.get("search/movie", &query).await?;
                page.results
                    .into_iter()
                    .filter_map(MovieResult::into_match)
                    .collect::<Vec<_>>()
            }
            MediaKind::Series => {
                if let Some(year) = year {
                    query.push(("first_air_date_year", year.to_string()));
                }
                let page: SearchResponse<TvResult> = self.get("search/tv", &query).await?;
                page.results
                    .into_iter()
                    .filter_map(TvResult::into_match)
                    .collect::<Vec<_>>()
            }
        };
        debug!(%kind, title, ?year, results = matches.len(), "TMDB search");
        Ok(matches)
    }

    async fn season_episodes(
        &self,
        series: CanonicalId,
    ) -> Result<Vec<SeasonEpisodes>, ProviderError> {
        let details: TvDetails = self.get(&format!("tv/{}", series.get()), &[]).await?;
        let mut seasons = Vec::with_capacity(details.seasons.len());
        for summary in details.seasons.into_iter().filter(|s| s.season_number > 0) {
            let path = format!("tv/{}/season/{}", series.get(), summary.season_number);
            let season: SeasonDetails = self.get(&path, &[]).await?;
            seasons.push(SeasonEpisodes {
                season_number: summary.season_number,
                episodes: season
                    .episodes
                    .into_iter()
                    .map(|ep| EpisodeAirDate {
                        episode_number: ep.episode_number,
                        air_date: ep.air_date.as_deref().and_then(parse_date),
                    })
                    .collect(),
            });
        }
        Ok(seasons)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_year(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<MovieResult>,
    #[serde(default)]
    tv_results: Vec<TvResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieResult {
    id: i64,
    title: Option<String>,
    release_date: Option<String>,
    popularity: Option<f64>,
}

impl MovieResult {
    fn into_match(self) -> Option<CatalogMatch> {
        let canonical_id = CanonicalId::new(self.id).ok()?;
        Some(CatalogMatch {
            canonical_id,
            kind: MediaKind::Movie,
            title: self.title.unwrap_or_default(),
            year: parse_year(self.release_date.as_deref()),
            popularity: self.popularity.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TvResult {
    id: i64,
    name: Option<String>,
    first_air_date: Option<String>,
    popularity: Option<f64>,
}

impl TvResult {
    fn into_match(self) -> Option<CatalogMatch> {
        let canonical_id = CanonicalId::new(self.id).ok()?;
        Some(CatalogMatch {
            canonical_id,
            kind: MediaKind::Series,
            title: self.name.unwrap_or_default(),
            year: parse_year(self.first_air_date.as_deref()),
            popularity: self.popularity.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    #[serde(default)]
    seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct SeasonSummary {
    season_number: i32,
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
    #[serde(default)]
    episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Deserialize)]
struct EpisodeSummary {
    episode_number: i32,
    air_date: Option<String>,
}
