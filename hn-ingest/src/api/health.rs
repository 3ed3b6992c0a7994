//! Health check endpoint

use axum::{extract::State, middleware, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::api::rate_limit::{enforce_rate_limit, EndpointLimiter};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database cannot be queried
    pub status: String,
    /// Module name ("hn-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_stored: Option<i64>,
    /// Database error, if the check failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let (status, items_stored, last_error) = match crate::db::items::count_items(&state.db).await {
        Ok(count) => ("ok", Some(count), None),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not query the database");
            ("degraded", None, Some(e.to_string()))
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "hn-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        items_stored,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes(limiter: EndpointLimiter) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route_layer(middleware::from_fn_with_state(limiter, enforce_rate_limit))
}
