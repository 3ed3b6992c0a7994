//! Namespaced key-value cache with per-entry TTL
//!
//! Used for upstream response memoization and job progress records. Callers
//! treat every [`CacheError`] as a miss or a no-op; the cache is never allowed
//! to fail the work it is accelerating.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Prefix applied to every stored key
pub const CACHE_PREFIX: &str = "hn_cache";

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unavailable or command failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Stored value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value cache contract
///
/// All operations are namespaced and tolerant of missing keys. Implementations
/// must be safe to share between concurrently running jobs.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get a value, `None` if missing or expired
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with a time-to-live
    async fn set(&self, namespace: &str, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a value, returns whether a live entry was removed
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError>;
}

/// Full storage key for a namespaced cache key
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    format!("{}:{}:{}", CACHE_PREFIX, namespace, key)
}

/// Get and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn KeyValueCache,
    namespace: &str,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(namespace, key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and store a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn KeyValueCache,
    namespace: &str,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set(namespace, key, &raw, ttl).await
}
