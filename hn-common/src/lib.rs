//! # hn-common
//!
//! Shared code for the hn-ingest service and its tooling:
//! - Common error type
//! - Configuration file resolution
//! - Namespaced key-value cache with TTL (in-memory, optional Redis)
//! - SQLite database initialization

pub mod cache;
pub mod config;
pub mod db;
pub mod error;

pub use cache::{CacheError, KeyValueCache};
pub use error::{Error, Result};
