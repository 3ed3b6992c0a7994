//! Fetch job lifecycle
//!
//! A job progresses `accepted → processing → completed`, or ends in `failed`
//! from any non-terminal state. Progress checkpoints within `processing` are
//! 30% (ids discovered), 60% (items fetched) and 90% (items stored).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of identifiers requested per job
pub const DEFAULT_LIMIT: usize = 100;

/// Largest number of identifiers a single job may request
pub const MAX_LIMIT: usize = 500;

/// Job status as exposed to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, waiting for a worker
    Accepted,
    /// A worker is running the pipeline
    Processing,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline stopped with an error
    Failed,
}

impl JobStatus {
    /// Check if status is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Progress record kept in the cache for each job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    /// Percentage complete (0 - 100)
    pub progress: u8,
    /// Human-readable description of the current step
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    /// Create a new record (created-at = updated-at = now)
    pub fn new(job_id: impl Into<String>, status: JobStatus, progress: u8, message: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut record = Self {
            job_id: job_id.into(),
            status,
            progress: 0,
            message: message.into(),
            created_at: now,
            updated_at: now,
        };
        record.progress = record.clamp_progress(progress);
        record
    }

    /// Merge an update into this record
    ///
    /// `created_at` is preserved and `updated_at` refreshed. Outside of
    /// `failed`, progress never moves backwards.
    pub fn apply(&mut self, status: JobStatus, progress: u8, message: impl Into<String>) {
        self.status = status;
        self.progress = self.clamp_progress(progress).max(match status {
            JobStatus::Failed => 0,
            _ => self.progress,
        });
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    fn clamp_progress(&self, progress: u8) -> u8 {
        match self.status {
            // Failed records carry 0 regardless of how far the job got
            JobStatus::Failed => 0,
            _ => progress.min(100),
        }
    }
}

/// Parameters of one fetch job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Keep items with score >= this value
    #[serde(default)]
    pub min_score: Option<i64>,
    /// Keep items whose title contains this (case-insensitive)
    #[serde(default)]
    pub keyword: Option<String>,
    /// Number of top identifiers to fetch
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            min_score: None,
            keyword: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Returned to the submitter immediately after enqueueing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Counters reported by the upsert stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// `new_items + updated_items`
    pub stored_count: usize,
    pub total_items: usize,
    pub new_items: usize,
    pub updated_items: usize,
    /// `total_items - stored_count`
    pub skipped_items: usize,
}

/// Filters a job ran with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiltersApplied {
    pub min_score: Option<i64>,
    pub keyword: Option<String>,
}

/// Final payload of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub job_id: String,
    pub ids_discovered: usize,
    pub items_fetched: usize,
    pub items_filtered: usize,
    #[serde(flatten)]
    pub storage: UpsertSummary,
    pub filters_applied: FiltersApplied,
}
