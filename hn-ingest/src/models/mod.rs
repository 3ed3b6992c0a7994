//! Data models for hn-ingest
//!
//! - Items as fetched (`RawItem`) and as stored (`Item`)
//! - Job lifecycle records and pipeline results

pub mod item;
pub mod job;

pub use item::{Item, ItemId, RawItem, StoredItem};
pub use job::{
    FetchRequest, FiltersApplied, JobHandle, JobProgress, JobStatus, PipelineResult, UpsertSummary, DEFAULT_LIMIT,
    MAX_LIMIT,
};
