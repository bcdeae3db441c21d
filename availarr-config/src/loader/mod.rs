pub mod error;

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use availarr_core::config::EngineConfig;
use availarr_core::service::Schedule;
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use url::Url;

use crate::models::sources::{EnvConfig, FileConfig, FileSourceConfig};
use crate::models::{
    CacheConfig, Config, ConfigMetadata, DatabaseConfig, ServerConfig, SourceConfig, TmdbConfig,
};
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("availarr.toml"),
        PathBuf::from("config/availarr.toml"),
    ]
});

const DEFAULT_CACHE_DIR: &str = "cache/identity";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Overrides taken instead of the process environment.
    pub env: Option<EnvConfig>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv()
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
        };

        let env = self.options.env.clone().unwrap_or_else(EnvConfig::gather);
        let (file, config_path) = self.load_file_config(&env)?;
        let mut warnings = Vec::new();
        if config_path.is_none() {
            warnings.push(
                "No availarr.toml detected; relying on environment variables and defaults"
                    .to_string(),
            );
        }

        let metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        let config = compose(file.unwrap_or_default(), env, metadata, &mut warnings)?;
        for warning in &warnings {
            warn!("{warning}");
        }
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => return Err(ConfigLoadError::MissingConfig { path }),
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS.iter().find(|p| p.exists()) {
                Some(path) => path.clone(),
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), sources = file.sources.len(), "configuration file loaded");
        Ok((Some(file), Some(path)))
    }
}

/// Merges a parsed file with environment overrides and validates the result.
pub fn compose(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
    warnings: &mut Vec<String>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        database: file_database,
        cache: file_cache,
        tmdb: file_tmdb,
        scan: file_scan,
        safety_net: file_safety_net,
        renditions,
        sources: file_sources,
    } = file;

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: env
            .database_url
            .or(file_database.url)
            .filter(|url| !url.trim().is_empty()),
        max_connections: file_database
            .max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };
    if database.url.is_none() {
        warnings.push("No database URL configured; state is kept in memory only".to_string());
    }

    let cache = CacheConfig {
        identity_dir: env
            .cache_dir
            .or(file_cache.identity_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
    };

    let api_key = env
        .tmdb_api_key
        .or(file_tmdb.api_key)
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigLoadError::MissingTmdbKey)?;
    let tmdb = TmdbConfig {
        api_key,
        language: file_tmdb.language,
        base_url: file_tmdb
            .base_url
            .map(|raw| parse_url("tmdb.base_url", &raw))
            .transpose()?,
    };

    let mut engine = EngineConfig::default();
    if let Some(timeout) = file_server.request_timeout.as_deref() {
        engine.request_timeout_secs = parse_duration("server.request_timeout", timeout)?
            .as_secs()
            .max(1);
    }
    if let Some(page_size) = file_scan.page_size {
        engine.scan.page_size = non_zero("scan.page_size", page_size)?;
    }
    if let Some(batch_size) = file_scan.batch_size {
        engine.scan.batch_size = non_zero("scan.batch_size", batch_size)?;
    }
    if let Some(pause) = file_scan.batch_pause.as_deref() {
        engine.scan.batch_pause_ms = millis(parse_duration("scan.batch_pause", pause)?);
    }
    if let Some(buffer) = file_scan.incremental_buffer.as_deref() {
        engine.scan.incremental_buffer_secs =
            parse_duration("scan.incremental_buffer", buffer)?.as_secs();
    }
    if let Some(delay) = file_safety_net.item_delay.as_deref() {
        engine.safety_net.item_delay_ms = millis(parse_duration("safety_net.item_delay", delay)?);
    }
    if let Some(renditions) = renditions {
        engine.renditions = renditions;
    }

    let defaults = Schedule::default();
    let schedule = Schedule {
        full_scan: interval("scan.full_interval", file_scan.full_interval, defaults.full_scan)?,
        incremental_scan: interval(
            "scan.incremental_interval",
            file_scan.incremental_interval,
            defaults.incremental_scan,
        )?,
        safety_net: interval(
            "safety_net.interval",
            file_safety_net.interval,
            defaults.safety_net,
        )?,
    };

    let sources = compose_sources(file_sources)?;
    if sources.iter().all(|s| !s.enabled) {
        warnings.push("No enabled media sources configured; scans will be empty".to_string());
    }

    Ok(Config {
        server,
        database,
        cache,
        tmdb,
        engine,
        schedule,
        sources,
        metadata,
    })
}

fn compose_sources(raw: Vec<FileSourceConfig>) -> Result<Vec<SourceConfig>, ConfigLoadError> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|source| {
            let id = source.id.trim().to_string();
            if !seen.insert(id.clone()) {
                return Err(ConfigLoadError::DuplicateSource(id));
            }
            if source.token.trim().is_empty() {
                return Err(ConfigLoadError::EmptySourceToken(id));
            }
            let base_url = parse_url(&format!("sources.{id}.base_url"), &source.base_url)?;
            Ok(SourceConfig {
                name: source.name.unwrap_or_else(|| id.clone()),
                id,
                kind: source.kind,
                base_url,
                token: source.token,
                enabled: source.enabled,
                high_tier: source.high_tier,
            })
        })
        .collect()
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigLoadError::InvalidDuration {
        field,
        value: value.to_string(),
        source,
    })
}

fn interval(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match value {
        Some(raw) => {
            let parsed = parse_duration(field, &raw)?;
            if parsed.is_zero() {
                return Err(ConfigLoadError::ZeroValue { field });
            }
            Ok(parsed)
        }
        None => Ok(default),
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(value.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        field: field.to_string(),
        value: value.to_string(),
        source,
    })
}

fn non_zero(field: &'static str, value: usize) -> Result<usize, ConfigLoadError> {
    if value == 0 {
        Err(ConfigLoadError::ZeroValue { field })
    } else {
        Ok(value)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use availarr_core::sources::SourceKind;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
port = 8080
request_timeout = "10s"

[tmdb]
api_key = "abc123"
language = "en-US"

[scan]
page_size = 50
batch_pause = "250ms"
incremental_buffer = "15m"
incremental_interval = "2m"

[safety_net]
interval = "3h"
item_delay = "100ms"

[renditions]
high_tier_min_height = 2000

[[sources]]
id = "plex-main"
kind = "plex"
base_url = "http://plex.local:32400"
token = "plex-token"

[[sources]]
id = "jelly-4k"
name = "Jellyfin 4K"
kind = "jellyfin"
base_url = "http://jelly.local:8096"
token = "jelly-token"
high_tier = true
enabled = false
"#;

    fn parse(raw: &str, env: EnvConfig) -> Result<Config, ConfigLoadError> {
        let file: FileConfig = toml::from_str(raw).unwrap();
        compose(file, env, ConfigMetadata::default(), &mut Vec::new())
    }

    #[test]
    fn sample_file_composes() {
        let config = parse(SAMPLE, EnvConfig::default()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.engine.request_timeout_secs, 10);
        assert_eq!(config.engine.scan.page_size, 50);
        assert_eq!(config.engine.scan.batch_size, 20);
        assert_eq!(config.engine.scan.batch_pause_ms, 250);
        assert_eq!(config.engine.scan.incremental_buffer_secs, 900);
        assert_eq!(config.engine.safety_net.item_delay_ms, 100);
        assert_eq!(config.engine.renditions.high_tier_min_height, 2000);
        assert_eq!(config.engine.renditions.high_tier_min_width, 3200);
        assert_eq!(config.schedule.incremental_scan, Duration::from_secs(120));
        assert_eq!(config.schedule.full_scan, Duration::from_secs(24 * 3600));
        assert_eq!(config.schedule.safety_net, Duration::from_secs(3 * 3600));

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, SourceKind::Plex);
        assert_eq!(config.sources[0].name, "plex-main");
        assert!(config.sources[1].high_tier);
        assert_eq!(config.enabled_sources().count(), 1);
    }

    #[test]
    fn environment_wins_over_file() {
        let env = EnvConfig {
            server_port: Some(9000),
            tmdb_api_key: Some("from-env".into()),
            database_url: Some("postgres://localhost/availarr".into()),
            cache_dir: Some(PathBuf::from("/tmp/identity")),
            ..Default::default()
        };
        let config = parse(SAMPLE, env).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.tmdb.api_key, "from-env");
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/availarr")
        );
        assert_eq!(config.identity_cache_dir(), std::path::Path::new("/tmp/identity"));
    }

    #[test]
    fn empty_file_uses_defaults_but_needs_a_key() {
        assert!(matches!(
            parse("", EnvConfig::default()),
            Err(ConfigLoadError::MissingTmdbKey)
        ));

        let config = parse(
            "",
            EnvConfig {
                tmdb_api_key: Some("k".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.schedule, Schedule::default());
        assert!(config.database.url.is_none());
    }

    #[test]
    fn duplicate_source_ids_are_rejected() {
        let raw = r#"
[tmdb]
api_key = "k"

[[sources]]
id = "a"
kind = "plex"
base_url = "http://one"
token = "t"

[[sources]]
id = "a"
kind = "jellyfin"
base_url = "http://two"
token = "t"
"#;
        assert!(matches!(
            parse(raw, EnvConfig::default()),
            Err(ConfigLoadError::DuplicateSource(id)) if id == "a"
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let raw = "[tmdb]\napi_key = \"k\"\n[scan]\nbatch_size = 0\n";
        assert!(matches!(
            parse(raw, EnvConfig::default()),
            Err(ConfigLoadError::ZeroValue {
                field: "scan.batch_size"
            })
        ));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let raw = "[tmdb]\napi_key = \"k\"\n[safety_net]\ninterval = \"soon\"\n";
        let err = parse(raw, EnvConfig::default()).unwrap_err();
        assert!(err.to_string().contains("safety_net.interval"));
    }

    #[test]
    fn loader_reads_an_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("availarr.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .with_env_file(dir.path().join("missing.env"))
            .with_env(EnvConfig::default())
            .load()
            .unwrap();
        assert_eq!(load.config.metadata.config_path.as_deref(), Some(path.as_path()));
        assert!(!load.config.metadata.env_file_loaded);
        assert_eq!(load.config.sources.len(), 2);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .with_config_path(dir.path().join("nope.toml"))
            .with_env_file(dir.path().join("missing.env"))
            .with_env(EnvConfig::default())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }
}
