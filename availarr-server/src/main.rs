use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use availarr_config::{Config, ConfigLoader};
use availarr_model::SourceId;
use availarr_server::{app_state::AppState, routes, startup};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "availarr")]
#[command(about = "Keeps request availability in sync with Plex and Jellyfin libraries")]
struct Cli {
    /// Path to availarr.toml (overrides AVAILARR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before the configuration
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduled tasks and the HTTP API (default)
    Serve(ServeArgs),
    /// Run one scan pass and exit
    Scan(ScanArgs),
    /// Run one safety-net pass and exit
    SafetyNet,
    /// Apply database migrations and exit
    Migrate,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Serve the API without starting the interval loops
    #[arg(long, default_value_t = false)]
    no_schedule: bool,
}

#[derive(ClapArgs, Debug, Clone)]
struct ScanArgs {
    /// Source id to scan; repeat for several. Defaults to every enabled source.
    #[arg(long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Only look at items added since the last successful scan
    #[arg(long, default_value_t = false)]
    incremental: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Pass summaries stay visible by default. Override via RUST_LOG.
                "info,availarr::scan=info,availarr::safety_net=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => run_server(config, args).await,
        Command::Scan(args) => run_scan(config, args).await,
        Command::SafetyNet => run_safety_net(config).await,
        Command::Migrate => run_migrate(config).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    let load = loader.load().context("failed to load configuration")?;

    let config = load.config;
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    match &config.metadata.config_path {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("configuration composed from environment and defaults"),
    }
    Ok(config)
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let pool = startup::connect_database(&config)
        .await?
        .context("migrate requires DATABASE_URL or [database].url")?;
    startup::migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

async fn run_scan(config: Config, args: ScanArgs) -> anyhow::Result<()> {
    let engine = startup::build_engine(&config).await?;
    let cancel = shutdown_on_ctrl_c();
    let ids: Vec<SourceId> = args.sources.into_iter().map(SourceId::new).collect();

    let result = engine
        .service
        .scan(&ids, args.incremental, &cancel)
        .await
        .context("scan failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(pool) = engine.pool {
        pool.close().await;
    }
    Ok(())
}

async fn run_safety_net(config: Config) -> anyhow::Result<()> {
    let engine = startup::build_engine(&config).await?;
    let cancel = shutdown_on_ctrl_c();

    let summary = engine
        .service
        .run_safety_net_pass(&cancel)
        .await
        .context("safety-net pass failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(pool) = engine.pool {
        pool.close().await;
    }
    Ok(())
}

async fn run_server(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let engine = startup::build_engine(&config).await?;
    let shutdown = shutdown_on_ctrl_c();
    let runners = engine.service.runners(config.schedule);

    let handles = if args.no_schedule {
        warn!("interval loops disabled; only manual triggers will run");
        Vec::new()
    } else {
        runners.spawn_all(&shutdown)
    };

    let state = AppState::new(engine.service.clone(), runners, shutdown.clone());
    let app = routes::create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("availarr listening on http://{addr}");

    let graceful = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await
        .context("HTTP server error")?;

    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "scheduled task ended abnormally");
        }
    }
    if let Some(pool) = engine.pool {
        pool.close().await;
    }
    info!("availarr stopped");
    Ok(())
}

/// A token cancelled on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                trigger.cancel();
            }
            Err(err) => warn!(error = %err, "failed to listen for Ctrl-C"),
        }
    });
    token
}

