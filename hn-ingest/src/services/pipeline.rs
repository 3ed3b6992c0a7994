//! Fetch-and-store pipeline
//!
//! **Stages and progress checkpoints:**
//! 1. Discover top ids (processing, 0 → 30)
//! 2. Fetch item bodies under bounded concurrency (→ 60)
//! 3. Normalize, deduplicate, filter
//! 4. Upsert in one transaction (→ 90)
//! 5. Result saved, then completed (100)
//!
//! Any stage error writes a `failed` record carrying the error text and is
//! then returned to the caller.

use crate::error::PipelineError;
use crate::models::{FetchRequest, FiltersApplied, JobStatus, PipelineResult};
use crate::services::normalizer::normalize_and_filter;
use crate::services::progress::ProgressTracker;
use crate::services::results::ResultStore;
use crate::services::source_client::HackerNewsClient;
use crate::services::upsert::upsert_items;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

/// Runs one job end to end with the collaborators it was built with
pub struct PipelineOrchestrator {
    client: HackerNewsClient,
    pool: SqlitePool,
    tracker: ProgressTracker,
    results: ResultStore,
    max_lock_wait_ms: u64,
}

impl PipelineOrchestrator {
    pub fn new(
        client: HackerNewsClient,
        pool: SqlitePool,
        tracker: ProgressTracker,
        results: ResultStore,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            client,
            pool,
            tracker,
            results,
            max_lock_wait_ms,
        }
    }

    /// Execute the pipeline for `job_id` and record its final state
    pub async fn run(&self, job_id: &str, request: &FetchRequest) -> Result<PipelineResult, PipelineError> {
        info!(
            job_id,
            limit = request.limit,
            min_score = ?request.min_score,
            keyword = ?request.keyword,
            "Pipeline started"
        );

        match self.execute(job_id, request).await {
            Ok(result) => {
                // Pollers that see `completed` must find the result
                self.results.save(&result).await;

                let message = format!(
                    "Completed: {} items stored ({} new, {} updated, {} unchanged)",
                    result.storage.stored_count,
                    result.storage.new_items,
                    result.storage.updated_items,
                    result.storage.skipped_items
                );
                self.tracker
                    .update(job_id, JobStatus::Completed, 100, message)
                    .await;
                info!(job_id, stored = result.storage.stored_count, "Pipeline completed");
                Ok(result)
            }
            Err(e) => {
                error!(job_id, error = %e, "Pipeline failed");
                self.tracker
                    .update(job_id, JobStatus::Failed, 0, format!("Pipeline failed: {}", e))
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(&self, job_id: &str, request: &FetchRequest) -> Result<PipelineResult, PipelineError> {
        self.tracker
            .update(job_id, JobStatus::Processing, 0, "Fetching top story ids")
            .await;

        let ids = self.client.list_top_identifiers(request.limit).await?;
        self.tracker
            .update(
                job_id,
                JobStatus::Processing,
                30,
                format!("Discovered {} ids, fetching items", ids.len()),
            )
            .await;

        let raw_items = self.client.fetch_items_batch(&ids).await;
        if raw_items.is_empty() && !ids.is_empty() {
            warn!(
                job_id,
                ids_discovered = ids.len(),
                "No items could be fetched for any discovered id"
            );
        }
        self.tracker
            .update(
                job_id,
                JobStatus::Processing,
                60,
                format!("Fetched {} items, filtering and storing", raw_items.len()),
            )
            .await;

        let filtered = normalize_and_filter(&raw_items, request.min_score, request.keyword.as_deref());
        let storage = upsert_items(&self.pool, &filtered, self.max_lock_wait_ms).await?;
        self.tracker
            .update(
                job_id,
                JobStatus::Processing,
                90,
                format!("Stored {} of {} items", storage.stored_count, storage.total_items),
            )
            .await;

        Ok(PipelineResult {
            job_id: job_id.to_string(),
            ids_discovered: ids.len(),
            items_fetched: raw_items.len(),
            items_filtered: filtered.len(),
            storage,
            filters_applied: FiltersApplied {
                min_score: request.min_score,
                keyword: request.keyword.clone(),
            },
        })
    }
}
