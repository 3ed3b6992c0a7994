//! Source client integration tests against the fake upstream

mod helpers;

use helpers::{test_client, test_config, FailingCache, FakeUpstream, UpstreamBehavior};
use hn_common::cache::InMemoryCache;
use hn_ingest::error::UpstreamError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn numbered_items(count: i64) -> Vec<serde_json::Value> {
    (1..=count)
        .map(|id| json!({"id": id, "title": format!("Story {}", id), "score": id * 10, "by": "pg", "time": 1700000000 + id}))
        .collect()
}

#[tokio::test]
async fn test_list_top_identifiers_respects_limit_and_order() {
    let mut behavior = UpstreamBehavior::default();
    behavior.top_ids = vec![9, 4, 7, 1, 3];
    let upstream = FakeUpstream::start(behavior).await;

    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));
    let ids = client.list_top_identifiers(3).await.unwrap();

    assert_eq!(ids, vec![9, 4, 7]);
}

#[tokio::test]
async fn test_list_is_memoized() {
    let upstream = FakeUpstream::start(UpstreamBehavior::with_items(numbered_items(3))).await;
    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));

    let first = client.list_top_identifiers(3).await.unwrap();
    let second = client.list_top_identifiers(3).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(upstream.top_requests(), 1);
}

#[tokio::test]
async fn test_memoization_shared_between_clients_on_same_cache() {
    let upstream = FakeUpstream::start(UpstreamBehavior::with_items(numbered_items(2))).await;
    let config = test_config(upstream.base_url());
    let cache = Arc::new(InMemoryCache::new());

    test_client(&config, cache.clone()).fetch_item(1).await.unwrap();
    let again = test_client(&config, cache).fetch_item(1).await.unwrap();

    assert!(again.is_some());
    assert_eq!(upstream.item_requests(1), 1);
}

#[tokio::test]
async fn test_missing_item_is_none_and_not_memoized() {
    let upstream = FakeUpstream::start(UpstreamBehavior::default()).await;
    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));

    assert!(client.fetch_item(404).await.unwrap().is_none());
    assert!(client.fetch_item(404).await.unwrap().is_none());

    assert_eq!(upstream.item_requests(404), 2);
}

#[tokio::test]
async fn test_batch_concurrency_is_bounded() {
    let mut behavior = UpstreamBehavior::with_items(numbered_items(10));
    behavior.item_delay = Duration::from_millis(50);
    let upstream = FakeUpstream::start(behavior).await;

    let mut config = test_config(upstream.base_url());
    config.upstream.max_concurrent_requests = 2;
    let client = test_client(&config, Arc::new(InMemoryCache::new()));

    let ids: Vec<i64> = (1..=10).collect();
    let items = client.fetch_items_batch(&ids).await;

    assert_eq!(items.len(), 10);
    assert!(upstream.max_in_flight() <= 2, "max in flight was {}", upstream.max_in_flight());
    assert!(upstream.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_batch_isolates_failing_item() {
    let mut behavior = UpstreamBehavior::with_items(numbered_items(4));
    behavior.failing_items.insert(2);
    let upstream = FakeUpstream::start(behavior).await;

    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));
    let items = client.fetch_items_batch(&[1, 2, 3, 4]).await;

    let mut ids: Vec<i64> = items.iter().filter_map(|item| item.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3, 4]);
    // 5xx is not retried
    assert_eq!(upstream.item_requests(2), 1);
}

#[tokio::test]
async fn test_batch_fetches_duplicates_once() {
    let upstream = FakeUpstream::start(UpstreamBehavior::with_items(numbered_items(2))).await;
    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));

    let items = client.fetch_items_batch(&[1, 1, 2, 1]).await;

    assert_eq!(items.len(), 2);
    assert_eq!(upstream.item_requests(1), 1);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let mut behavior = UpstreamBehavior::with_items(numbered_items(2));
    behavior.slow_top_requests = (1, Duration::from_millis(1500));
    let upstream = FakeUpstream::start(behavior).await;

    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));
    let ids = client.list_top_identifiers(10).await.unwrap();

    assert_eq!(ids, vec![1, 2]);
    assert_eq!(upstream.top_requests(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut behavior = UpstreamBehavior::default();
    behavior.top_status = Some(404);
    let upstream = FakeUpstream::start(behavior).await;

    let client = test_client(&test_config(upstream.base_url()), Arc::new(InMemoryCache::new()));
    let err = client.list_top_identifiers(10).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
    assert_eq!(upstream.top_requests(), 1);
}

#[tokio::test]
async fn test_connection_refused_is_reported_after_retries() {
    // Grab a free port, then close it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = test_client(&test_config(&format!("http://{}/v0", addr)), Arc::new(InMemoryCache::new()));
    let err = client.list_top_identifiers(5).await.unwrap_err();

    assert!(err.is_transient(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_failing_cache_does_not_fail_calls() {
    let upstream = FakeUpstream::start(UpstreamBehavior::with_items(numbered_items(3))).await;
    let client = test_client(&test_config(upstream.base_url()), Arc::new(FailingCache));

    assert_eq!(client.list_top_identifiers(3).await.unwrap(), vec![1, 2, 3]);
    assert_eq!(client.list_top_identifiers(3).await.unwrap(), vec![1, 2, 3]);
    assert!(client.fetch_item(1).await.unwrap().is_some());

    // Nothing was memoized
    assert_eq!(upstream.top_requests(), 2);
}
