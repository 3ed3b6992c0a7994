//! Fetch job API handlers
//!
//! POST /fetch, GET /fetch/:task_id, GET /fetch/:task_id/result

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::rate_limit::{enforce_rate_limit, RateLimits},
    error::{ApiError, ApiResult},
    models::{FetchRequest, JobProgress, JobStatus, PipelineResult, DEFAULT_LIMIT, MAX_LIMIT},
    AppState,
};

/// POST /fetch query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    pub min_score: Option<i64>,
    pub keyword: Option<String>,
    pub limit: Option<usize>,
}

impl FetchParams {
    fn into_request(self) -> ApiResult<FetchRequest> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if self.min_score.is_some_and(|score| score < 0) {
            return Err(ApiError::BadRequest("min_score must not be negative".to_string()));
        }

        Ok(FetchRequest {
            min_score: self.min_score,
            keyword: self.keyword,
            limit,
        })
    }
}

/// POST /fetch response
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /fetch
///
/// Queue a fetch job. Returns 202 Accepted with the task id to poll.
pub async fn submit_fetch(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let request = params.into_request()?;
    let handle = state.broker.submit(request).await;

    tracing::info!(task_id = %handle.job_id, "Fetch job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: handle.job_id,
            status: handle.status,
            message: handle.message,
            timestamp: handle.timestamp,
        }),
    ))
}

/// GET /fetch/:task_id
///
/// Poll job progress.
pub async fn get_fetch_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<JobProgress>> {
    let record = state
        .broker
        .tracker()
        .get(&task_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?;

    tracing::debug!(task_id = %task_id, status = ?record.status, "Status query");

    Ok(Json(record))
}

/// GET /fetch/:task_id/result
///
/// Final counts of a completed job.
pub async fn get_fetch_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<PipelineResult>> {
    if let Some(result) = state.broker.result(&task_id).await {
        return Ok(Json(result));
    }

    match state.broker.tracker().get(&task_id).await {
        Some(record) => Err(ApiError::NotFound(format!(
            "No result for task {} (status: {:?})",
            task_id, record.status
        ))),
        None => Err(ApiError::NotFound(format!("Task not found: {}", task_id))),
    }
}

/// Build fetch job routes
///
/// Submission and status polling are limited separately.
pub fn fetch_routes(limits: &RateLimits) -> Router<AppState> {
    let submit = Router::new()
        .route("/fetch", post(submit_fetch))
        .route_layer(middleware::from_fn_with_state(limits.fetch.clone(), enforce_rate_limit));

    let status = Router::new()
        .route("/fetch/:task_id", get(get_fetch_status))
        .route("/fetch/:task_id/result", get(get_fetch_result))
        .route_layer(middleware::from_fn_with_state(limits.status.clone(), enforce_rate_limit));

    submit.merge(status)
}
