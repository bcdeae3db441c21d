pub mod sources;

use std::path::{Path, PathBuf};

use availarr_core::config::EngineConfig;
use availarr_core::service::Schedule;
use availarr_core::sources::SourceKind;
use url::Url;

/// Fully composed configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub tmdb: TmdbConfig,
    pub engine: EngineConfig,
    pub schedule: Schedule,
    pub sources: Vec<SourceConfig>,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache.identity_dir)
    }

    pub fn identity_cache_dir(&self) -> &Path {
        &self.cache.identity_dir
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs the engine on in-memory stores.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub identity_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub language: Option<String>,
    pub base_url: Option<Url>,
}

/// One media server to poll.
#[derive(Clone)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub base_url: Url,
    pub token: String,
    pub enabled: bool,
    pub high_tier: bool,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("high_tier", &self.high_tier)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
