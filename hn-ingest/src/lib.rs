//! hn-ingest library interface
//!
//! Background fetch-and-store pipeline for the Hacker News API, with the
//! broker and HTTP routes that front it. Exposed as a library for
//! integration testing.

pub mod api;
pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::api::RateLimits;
use crate::broker::{BrokerSettings, JobBroker, PipelineRunner};
use crate::config::IngestConfig;
use crate::services::{ProgressTracker, ResultStore};
use axum::Router;
use chrono::{DateTime, Utc};
use hn_common::KeyValueCache;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Item store
    pub db: SqlitePool,
    /// Job submission, progress and results
    pub broker: JobBroker,
    /// Inbound per-client quotas
    pub rate_limits: RateLimits,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, broker: JobBroker, rate_limits: RateLimits) -> Self {
        Self {
            db,
            broker,
            rate_limits,
            startup_time: Utc::now(),
        }
    }

    /// Wire the tracker, pipeline runner and worker pool, and start the workers
    pub fn start(config: &IngestConfig, db: SqlitePool, cache: Arc<dyn KeyValueCache>) -> reqwest::Result<Self> {
        let tracker = ProgressTracker::new(Arc::clone(&cache), config.cache.progress_ttl());
        let results = ResultStore::new(Arc::clone(&cache), config.cache.progress_ttl());
        let runner = PipelineRunner::new(config, db.clone(), cache, tracker.clone(), results.clone())?;
        let broker = JobBroker::start(Arc::new(runner), tracker, results, BrokerSettings::from_config(config));

        Ok(Self::new(db, broker, RateLimits::from_config(&config.rate_limit)))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let limits = state.rate_limits.clone();

    Router::new()
        .merge(api::fetch_routes(&limits))
        .merge(api::data_routes(limits.data))
        .merge(api::health_routes(limits.health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
