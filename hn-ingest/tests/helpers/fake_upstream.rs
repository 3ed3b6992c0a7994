//! Fake Hacker News API
//!
//! Serves `/v0/topstories.json` and `/v0/item/{id}.json` from an axum server
//! bound to 127.0.0.1:0, with configurable failures and delays, and counts
//! every request it sees.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake upstream responds
#[derive(Debug, Clone, Default)]
pub struct UpstreamBehavior {
    pub top_ids: Vec<i64>,
    pub items: HashMap<i64, Value>,
    /// Item ids answered with HTTP 500
    pub failing_items: HashSet<i64>,
    /// Delay before answering any item request
    pub item_delay: Duration,
    /// Status returned for the id list instead of the list
    pub top_status: Option<u16>,
    /// The first `n` id-list requests are delayed by the given duration
    pub slow_top_requests: (u32, Duration),
}

impl UpstreamBehavior {
    pub fn with_items(items: Vec<Value>) -> Self {
        let top_ids = items.iter().filter_map(|v| v["id"].as_i64()).collect();
        let items = items
            .into_iter()
            .filter_map(|v| v["id"].as_i64().map(|id| (id, v)))
            .collect();
        Self {
            top_ids,
            items,
            ..Default::default()
        }
    }
}

struct FakeState {
    behavior: UpstreamBehavior,
    top_requests: AtomicU32,
    item_requests: Mutex<HashMap<i64, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Running fake upstream
pub struct FakeUpstream {
    base_url: String,
    state: Arc<FakeState>,
}

impl FakeUpstream {
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let state = Arc::new(FakeState {
            behavior,
            top_requests: AtomicU32::new(0),
            item_requests: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/v0/topstories.json", get(top_stories))
            .route("/v0/item/:file", get(item))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}/v0", addr),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn top_requests(&self) -> u32 {
        self.state.top_requests.load(Ordering::SeqCst)
    }

    pub fn item_requests(&self, id: i64) -> u32 {
        self.state
            .item_requests
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

async fn top_stories(State(state): State<Arc<FakeState>>) -> Response {
    let n = state.top_requests.fetch_add(1, Ordering::SeqCst) + 1;

    let (slow_count, delay) = state.behavior.slow_top_requests;
    if n <= slow_count {
        tokio::time::sleep(delay).await;
    }

    if let Some(status) = state.behavior.top_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "upstream says no").into_response();
    }

    Json(state.behavior.top_ids.clone()).into_response()
}

struct InFlightGuard<'a>(&'a FakeState);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn item(State(state): State<Arc<FakeState>>, Path(file): Path<String>) -> Response {
    let Some(id) = file.strip_suffix(".json").and_then(|s| s.parse::<i64>().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    *state.item_requests.lock().unwrap().entry(id).or_insert(0) += 1;

    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(current, Ordering::SeqCst);
    let _guard = InFlightGuard(&state);

    if !state.behavior.item_delay.is_zero() {
        tokio::time::sleep(state.behavior.item_delay).await;
    }

    if state.behavior.failing_items.contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    match state.behavior.items.get(&id) {
        Some(value) => Json(value.clone()).into_response(),
        None => Json(Value::Null).into_response(),
    }
}
