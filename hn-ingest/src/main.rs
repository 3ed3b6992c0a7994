//! hn-ingest - Hacker News fetch-and-store service
//!
//! Accepts fetch jobs over HTTP, runs them on a background worker pool and
//! serves the stored items. Job progress is polled via `GET /fetch/:task_id`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hn_common::cache::InMemoryCache;
use hn_common::KeyValueCache;
use hn_ingest::config::IngestConfig;
use hn_ingest::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hn-ingest")]
#[command(about = "Background fetch-and-store pipeline for the Hacker News API")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HN_INGEST_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "HN_INGEST_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "HN_INGEST_DATABASE")]
    database: Option<PathBuf>,

    #[arg(long, env = "HN_INGEST_UPSTREAM_URL")]
    upstream_url: Option<String>,

    #[arg(long, env = "HN_INGEST_REDIS_URL")]
    redis_url: Option<String>,
}

impl Args {
    fn apply_overrides(&self, config: &mut IngestConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref database) = self.database {
            config.database.path = Some(database.clone());
        }
        if let Some(ref url) = self.upstream_url {
            config.upstream.base_url = url.clone();
        }
        if let Some(ref url) = self.redis_url {
            config.cache.redis_url = Some(url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = IngestConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hn_ingest={0},hn_common={0},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Invalid configuration")?;

    info!("Starting hn-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Upstream: {}", config.upstream.base_url);

    let db_path = config.database.resolved_path();
    info!("Database: {}", db_path.display());
    let db_pool = hn_common::db::init_database_with_pool_size(&db_path, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;

    let cache = build_cache(&config)?;

    let state = AppState::start(&config, db_pool, cache).context("Failed to build HTTP client")?;
    let broker = state.broker.clone();

    let app = hn_ingest::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    broker.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

fn build_cache(config: &IngestConfig) -> Result<Arc<dyn KeyValueCache>> {
    match config.cache.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let cache = hn_common::cache::RedisCache::new(url).context("Failed to configure Redis cache")?;
            info!("Cache: redis");
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("cache.redis_url is set but hn-ingest was built without the redis feature, using in-memory cache");
            Ok(Arc::new(InMemoryCache::with_sweep_interval(config.cache.sweep_interval())))
        }
        None => {
            info!(sweep_interval_secs = config.cache.sweep_interval_seconds, "Cache: in-memory");
            Ok(Arc::new(InMemoryCache::with_sweep_interval(config.cache.sweep_interval())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
