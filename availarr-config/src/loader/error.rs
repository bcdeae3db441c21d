use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl {
        field: String,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("TMDB API key missing; set [tmdb].api_key or TMDB_API_KEY")]
    MissingTmdbKey,
    #[error("source id '{0}' is configured more than once")]
    DuplicateSource(String),
    #[error("source '{0}' has an empty token")]
    EmptySourceToken(String),
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
