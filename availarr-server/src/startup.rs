//! Builds the engine from a loaded [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use availarr_config::{Config, build_sources};
use availarr_core::events::{
    AvailabilityEventSink, BroadcastEventSink, FanoutEventSink, TracingEventSink,
};
use availarr_core::identity::CacacheIdentityCache;
use availarr_core::persistence::{
    InMemoryCheckpointStore, InMemoryFulfillmentCache, InMemoryRequestLedger,
    InMemoryStatusStore, PostgresCheckpointStore, PostgresFulfillmentCache,
    PostgresRequestLedger, PostgresStatusStore,
};
use availarr_core::providers::{CatalogLookup, TmdbCatalog};
use availarr_core::service::{AvailabilityService, EngineParts};
use availarr_core::sources::StaticSourceCatalog;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The assembled engine and the handles around it.
#[derive(Debug, Clone)]
pub struct Engine {
    pub service: Arc<AvailabilityService>,
    pub events: BroadcastEventSink,
    pub pool: Option<PgPool>,
}

pub async fn connect_database(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = config.database.url.as_deref() else {
        return Ok(None);
    };
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        anyhow::bail!("DATABASE_URL must be a postgres:// or postgresql:// URL");
    }
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;
    Ok(Some(pool))
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    availarr_core::MIGRATOR
        .run(pool)
        .await
        .context("failed to apply database migrations")?;
    info!("database migrations applied");
    Ok(())
}

pub async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    config
        .ensure_directories()
        .with_context(|| {
            format!(
                "failed to create identity cache directory {}",
                config.identity_cache_dir().display()
            )
        })?;

    let pool = connect_database(config).await?;
    if let Some(pool) = &pool {
        migrate(pool).await?;
    }

    let sources = build_sources(&config.sources).context("failed to configure media sources")?;
    info!(
        configured = sources.len(),
        enabled = config.enabled_sources().count(),
        "media sources ready"
    );

    let mut tmdb = match &config.tmdb.base_url {
        Some(url) => TmdbCatalog::with_base_url(config.tmdb.api_key.clone(), url.as_str()),
        None => TmdbCatalog::new(config.tmdb.api_key.clone()),
    }
    .context("failed to configure the TMDB client")?;
    tmdb = tmdb.with_language(config.tmdb.language.clone());
    let catalog: Arc<dyn CatalogLookup> = Arc::new(tmdb);

    let broadcast = BroadcastEventSink::new(EVENT_CHANNEL_CAPACITY);
    let sinks: Vec<Arc<dyn AvailabilityEventSink>> =
        vec![Arc::new(TracingEventSink), Arc::new(broadcast.clone())];
    let events: Arc<dyn AvailabilityEventSink> = Arc::new(FanoutEventSink::new(sinks));

    let identity_cache = Arc::new(CacacheIdentityCache::new(config.identity_cache_dir()));
    let sources = Arc::new(StaticSourceCatalog::new(sources));

    let parts = match &pool {
        Some(pool) => EngineParts {
            sources,
            catalog,
            identity_cache,
            store: Arc::new(PostgresStatusStore::new(pool.clone())),
            requests: Arc::new(PostgresRequestLedger::new(pool.clone())),
            fulfillment: Arc::new(PostgresFulfillmentCache::new(pool.clone())),
            checkpoints: Arc::new(PostgresCheckpointStore::new(pool.clone())),
            events,
        },
        None => {
            warn!("running on in-memory stores; state is lost on restart");
            EngineParts {
                sources,
                catalog,
                identity_cache,
                store: Arc::new(InMemoryStatusStore::new()),
                requests: Arc::new(InMemoryRequestLedger::new()),
                fulfillment: Arc::new(InMemoryFulfillmentCache::new()),
                checkpoints: Arc::new(InMemoryCheckpointStore::new()),
                events,
            }
        }
    };

    let service = Arc::new(AvailabilityService::new(parts, config.engine.clone()));
    Ok(Engine {
        service,
        events: broadcast,
        pool,
    })
}
