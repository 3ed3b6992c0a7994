//! Pipeline results
//!
//! Stored under namespace `results`, key `job:{job_id}`, for the same
//! retention window as progress records.

use crate::models::PipelineResult;
use hn_common::cache::{get_json, set_json};
use hn_common::KeyValueCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Cache namespace for pipeline results
pub const RESULTS_NAMESPACE: &str = "results";

pub fn result_key(job_id: &str) -> String {
    format!("job:{}", job_id)
}

/// Saves and loads the result of each successful job
#[derive(Clone)]
pub struct ResultStore {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Best effort; a failed write is logged
    pub async fn save(&self, result: &PipelineResult) {
        if let Err(e) = set_json(
            self.cache.as_ref(),
            RESULTS_NAMESPACE,
            &result_key(&result.job_id),
            result,
            self.ttl,
        )
        .await
        {
            warn!(job_id = %result.job_id, error = %e, "Failed to store job result");
        }
    }

    /// `None` if unknown, unfinished, expired or unreadable
    pub async fn get(&self, job_id: &str) -> Option<PipelineResult> {
        match get_json(self.cache.as_ref(), RESULTS_NAMESPACE, &result_key(job_id)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(job_id, error = %e, "Failed to read job result");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FiltersApplied, UpsertSummary};
    use hn_common::cache::InMemoryCache;

    fn result(job_id: &str) -> PipelineResult {
        PipelineResult {
            job_id: job_id.to_string(),
            ids_discovered: 3,
            items_fetched: 3,
            items_filtered: 1,
            storage: UpsertSummary {
                stored_count: 1,
                total_items: 1,
                new_items: 1,
                updated_items: 0,
                skipped_items: 0,
            },
            filters_applied: FiltersApplied {
                min_score: Some(100),
                keyword: Some("python".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = ResultStore::new(Arc::new(InMemoryCache::new()), Duration::from_secs(60));

        store.save(&result("job-1")).await;

        let loaded = store.get("job-1").await.unwrap();
        assert_eq!(loaded.items_filtered, 1);
        assert_eq!(loaded.filters_applied.keyword.as_deref(), Some("python"));
        assert!(store.get("job-2").await.is_none());
    }

    #[tokio::test]
    async fn test_result_expires() {
        let store = ResultStore::new(Arc::new(InMemoryCache::new()), Duration::from_millis(10));

        store.save(&result("job-1")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("job-1").await.is_none());
    }
}
