//! Pipeline services
//!
//! Leaves first: retry and memoization helpers, the upstream client, the
//! normalizer, the upsert, the progress tracker and the orchestrator that
//! chains them.

pub mod memo;
pub mod normalizer;
pub mod pipeline;
pub mod progress;
pub mod results;
pub mod retry;
pub mod source_client;
pub mod upsert;

pub use normalizer::normalize_and_filter;
pub use pipeline::PipelineOrchestrator;
pub use progress::ProgressTracker;
pub use results::ResultStore;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use source_client::{HackerNewsClient, SourceSettings};
pub use upsert::upsert_items;
