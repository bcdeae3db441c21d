use std::path::PathBuf;

use availarr_core::config::RenditionPolicy;
use availarr_core::sources::SourceKind;
use serde::{Deserialize, Serialize};

/// Raw configuration as written in `availarr.toml`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub tmdb: FileTmdbConfig,
    #[serde(default)]
    pub scan: FileScanConfig,
    #[serde(default)]
    pub safety_net: FileSafetyNetConfig,
    pub renditions: Option<RenditionPolicy>,
    #[serde(default)]
    pub sources: Vec<FileSourceConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Deadline for every outbound call, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTmdbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Durations are humantime strings (`"1s"`, `"10m"`, `"24h"`).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_pause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_buffer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSafetyNetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_delay: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileSourceConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: SourceKind,
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub high_tier: bool,
}

fn default_true() -> bool {
    true
}

/// Environment-derived overrides.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("AVAILARR_CONFIG").map(PathBuf::from),
            server_host: non_empty_var("AVAILARR_HOST"),
            server_port: non_empty_var("AVAILARR_PORT").and_then(|s| s.parse().ok()),
            database_url: non_empty_var("DATABASE_URL"),
            tmdb_api_key: non_empty_var("TMDB_API_KEY"),
            cache_dir: non_empty_var("AVAILARR_CACHE_DIR").map(PathBuf::from),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
