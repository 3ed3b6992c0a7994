//! Job progress records
//!
//! Records live in the cache under namespace `jobs`, key `task:{job_id}`, and
//! expire after the retention window. Cache failures are logged and never
//! reach the caller.

use crate::models::{JobProgress, JobStatus};
use hn_common::cache::{get_json, set_json};
use hn_common::KeyValueCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Cache namespace for progress records
pub const JOBS_NAMESPACE: &str = "jobs";

fn record_key(job_id: &str) -> String {
    format!("task:{}", job_id)
}

/// Reads and writes job progress records
#[derive(Clone)]
pub struct ProgressTracker {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl ProgressTracker {
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Create or merge the record for `job_id`, returning what was written.
    ///
    /// The merged record is returned even when the write itself failed.
    pub async fn update(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: u8,
        message: impl Into<String>,
    ) -> JobProgress {
        let message = message.into();

        let record = match self.get(job_id).await {
            Some(mut existing) => {
                existing.apply(status, progress, message);
                existing
            }
            None => JobProgress::new(job_id, status, progress, message),
        };

        match set_json(self.cache.as_ref(), JOBS_NAMESPACE, &record_key(job_id), &record, self.ttl).await {
            Ok(()) => debug!(
                job_id,
                status = ?record.status,
                progress = record.progress,
                "Progress recorded"
            ),
            Err(e) => error!(job_id, error = %e, "Failed to record job progress"),
        }

        record
    }

    /// Current record, `None` when missing, expired or unreadable
    pub async fn get(&self, job_id: &str) -> Option<JobProgress> {
        match get_json(self.cache.as_ref(), JOBS_NAMESPACE, &record_key(job_id)).await {
            Ok(record) => record,
            Err(e) => {
                error!(job_id, error = %e, "Failed to read job progress");
                None
            }
        }
    }
}
