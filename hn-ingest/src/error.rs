//! Error types for hn-ingest
//!
//! - [`UpstreamError`]: remote API failures (after retries)
//! - [`PipelineError`]: anything that fails a job
//! - [`ApiError`]: HTTP mapping for the routing layer

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Remote API errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl UpstreamError {
    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            UpstreamError::Timeout { url }
        } else if err.is_connect() {
            UpstreamError::Connection {
                url,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            UpstreamError::Decode {
                url,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            UpstreamError::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            UpstreamError::Transport {
                url,
                message: err.to_string(),
            }
        }
    }

    /// Only connection failures and timeouts are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. } | UpstreamError::Connection { .. })
    }
}

/// Errors that fail a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] hn_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Client exceeded the endpoint quota (429)
    #[error("Too many requests to {endpoint}, retry in {retry_after_secs}s")]
    RateLimited { endpoint: String, retry_after_secs: u64 },

    /// hn-common error
    #[error("Common error: {0}")]
    Common(#[from] hn_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match self {
            ApiError::RateLimited { retry_after_secs, .. } => Some(retry_after_secs),
            _ => None,
        };

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ref err @ ApiError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", err.to_string())
            }
            ApiError::Common(hn_common::Error::NotFound(msg)) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(hn_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        match retry_after {
            Some(secs) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
