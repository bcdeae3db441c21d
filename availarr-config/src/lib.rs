//! Configuration for availarr.
//!
//! [`ConfigLoader`] layers an optional `.env`, a TOML file and environment
//! overrides into a validated [`Config`]. Engine tuning structs come from
//! `availarr-core` and keep their defaults when a section is omitted.

pub mod loader;
pub mod media_sources;
pub mod models;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use media_sources::build_sources;
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    CacheConfig, Config, ConfigMetadata, DatabaseConfig, ServerConfig, SourceConfig, TmdbConfig,
};
