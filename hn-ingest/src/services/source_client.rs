//! Hacker News API client
//!
//! Two read endpoints are used:
//! - `{base}/topstories.json`: ranked list of item ids
//! - `{base}/item/{id}.json`: one item body, or `null` when it does not exist
//!
//! Every request waits on the shared outbound rate limiter, is retried through
//! [`retry_with_backoff`] and memoized through [`memoize`]. A client is built
//! per job from shared parts (connection pool, rate limiter, cache).

use crate::config::IngestConfig;
use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::models::{ItemId, RawItem};
use crate::services::memo::{memoize, memoize_optional};
use crate::services::retry::{retry_with_backoff, RetryPolicy};
use futures::stream::{FuturesUnordered, StreamExt};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use hn_common::KeyValueCache;
use serde_json::Value;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Cache namespace for upstream responses
pub const HN_CACHE_NAMESPACE: &str = "hn";

/// Outbound limiter shared by every client built from the same parts
pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build the pooled HTTP client shared by all jobs
pub fn build_http_client(config: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .build()
}

/// Build a direct rate limiter allowing `requests_per_second`
pub fn build_rate_limiter(requests_per_second: u32) -> Arc<DirectRateLimiter> {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
}

/// Per-client tunables
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// API root without trailing slash
    pub base_url: String,
    /// Concurrent item fetches within one batch (K)
    pub max_concurrent_requests: usize,
    /// Memoization TTL
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl SourceSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            max_concurrent_requests: config.upstream.max_concurrent_requests.max(1),
            cache_ttl: config.cache.ttl(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Client for the Hacker News Firebase API
pub struct HackerNewsClient {
    settings: SourceSettings,
    http: reqwest::Client,
    rate_limiter: Arc<DirectRateLimiter>,
    cache: Arc<dyn KeyValueCache>,
}

impl HackerNewsClient {
    pub fn new(
        settings: SourceSettings,
        http: reqwest::Client,
        rate_limiter: Arc<DirectRateLimiter>,
        cache: Arc<dyn KeyValueCache>,
    ) -> Self {
        Self {
            settings,
            http,
            rate_limiter,
            cache,
        }
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// First `limit` ids of the ranked list, in upstream order
    pub async fn list_top_identifiers(&self, limit: usize) -> Result<Vec<ItemId>, UpstreamError> {
        let key = format!("topstories:limit={}", limit);

        memoize(
            self.cache.as_ref(),
            HN_CACHE_NAMESPACE,
            &key,
            self.settings.cache_ttl,
            || async {
                let url = format!("{}/topstories.json", self.settings.base_url);
                let body = self.get_json(&url).await?;

                let ids: Vec<ItemId> = serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
                    url: url.clone(),
                    message: format!("expected a list of item ids: {}", e),
                })?;

                info!(available = ids.len(), limit, "Fetched top story ids");
                Ok::<_, UpstreamError>(ids.into_iter().take(limit).collect())
            },
        )
        .await
    }

    /// One item body, `None` when upstream has no such item
    pub async fn fetch_item(&self, id: ItemId) -> Result<Option<RawItem>, UpstreamError> {
        let key = format!("item:{}", id);

        memoize_optional(
            self.cache.as_ref(),
            HN_CACHE_NAMESPACE,
            &key,
            self.settings.cache_ttl,
            || async {
                let url = format!("{}/item/{}.json", self.settings.base_url, id);
                match self.get_json(&url).await? {
                    Value::Null => Ok::<_, UpstreamError>(None),
                    other => RawItem::from_value(other)
                        .map(Some)
                        .ok_or_else(|| UpstreamError::Decode {
                            url,
                            message: "expected a JSON object".to_string(),
                        }),
                }
            },
        )
        .await
    }

    /// Fetch many items with at most `max_concurrent_requests` in flight.
    ///
    /// Duplicate ids are fetched once. Items that fail or do not exist are
    /// logged and left out; the batch itself does not fail. Output order is
    /// completion order.
    pub async fn fetch_items_batch(&self, ids: &[ItemId]) -> Vec<RawItem> {
        let semaphore = Semaphore::new(self.settings.max_concurrent_requests.max(1));
        let mut seen = HashSet::new();

        let mut in_flight: FuturesUnordered<_> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .map(|id| {
                let semaphore = &semaphore;
                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                id,
                                Err(UpstreamError::Transport {
                                    url: format!("{}/item/{}.json", self.settings.base_url, id),
                                    message: "fetch slot unavailable".to_string(),
                                }),
                            )
                        }
                    };
                    (id, self.fetch_item(id).await)
                }
            })
            .collect();

        let requested = in_flight.len();
        let mut items = Vec::with_capacity(requested);
        let mut failed = 0usize;

        while let Some((id, result)) = in_flight.next().await {
            match result {
                Ok(Some(item)) => items.push(item),
                Ok(None) => debug!(item_id = id, "Item not found upstream, skipping"),
                Err(e) => {
                    failed += 1;
                    warn!(item_id = id, error = %e, "Failed to fetch item, excluding from batch");
                }
            }
        }

        info!(requested, fetched = items.len(), failed, "Batch fetch complete");
        items
    }

    /// GET with retry; an empty body decodes to `null`
    async fn get_json(&self, url: &str) -> Result<Value, UpstreamError> {
        let operation = format!("GET {}", url);
        retry_with_backoff(&operation, &self.settings.retry, || self.get_json_once(url)).await
    }

    async fn get_json_once(&self, url: &str) -> Result<Value, UpstreamError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
