//! Test Helper Utilities
//!
//! Shared utilities for testing hn-ingest

#![allow(dead_code)]

pub mod caches;
pub mod db_utils;
pub mod fake_upstream;

use hn_common::KeyValueCache;
use hn_ingest::config::IngestConfig;
use hn_ingest::services::source_client::{build_http_client, build_rate_limiter};
use hn_ingest::services::{HackerNewsClient, SourceSettings};
use std::sync::Arc;

pub use caches::{FailingCache, RecordingCache};
pub use db_utils::{create_test_db, get_table_columns};
pub use fake_upstream::{FakeUpstream, UpstreamBehavior};

/// Configuration pointing at `base_url` with fast retries and no effective rate limits
pub fn test_config(base_url: &str) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.timeout_seconds = 1;
    config.upstream.connect_timeout_seconds = 1;
    config.upstream.requests_per_second = 10_000;
    config.retry.base_delay_ms = 5;
    config.retry.max_delay_ms = 20;
    config.workers.count = 1;
    config.rate_limit.enabled = false;
    config
}

/// Source client built the same way the broker builds one per job
pub fn test_client(config: &IngestConfig, cache: Arc<dyn KeyValueCache>) -> HackerNewsClient {
    HackerNewsClient::new(
        SourceSettings::from_config(config),
        build_http_client(&config.upstream).expect("http client"),
        build_rate_limiter(config.upstream.requests_per_second),
        cache,
    )
}
