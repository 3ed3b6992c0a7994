//! Read-through memoization of upstream responses
//!
//! Cache failures are logged and treated as a miss (on read) or ignored (on
//! write). A failing cache never fails the lookup it wraps.

use hn_common::cache::{get_json, set_json};
use hn_common::KeyValueCache;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

async fn lookup<T: DeserializeOwned>(cache: &dyn KeyValueCache, namespace: &str, key: &str) -> Option<T> {
    match get_json::<T>(cache, namespace, key).await {
        Ok(Some(value)) => {
            debug!(namespace, key, "Cache hit");
            Some(value)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(namespace, key, error = %e, "Cache read failed, treating as miss");
            None
        }
    }
}

async fn store<T: Serialize>(cache: &dyn KeyValueCache, namespace: &str, key: &str, value: &T, ttl: Duration) {
    if let Err(e) = set_json(cache, namespace, key, value, ttl).await {
        warn!(namespace, key, error = %e, "Cache write failed, continuing without memoization");
    }
}

/// Return the cached value for `key`, or compute, store and return it.
///
/// Errors from `compute` are returned unchanged and nothing is stored.
pub async fn memoize<T, E, F, Fut>(
    cache: &dyn KeyValueCache,
    namespace: &str,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(hit) = lookup(cache, namespace, key).await {
        return Ok(hit);
    }

    let value = compute().await?;
    store(cache, namespace, key, &value, ttl).await;
    Ok(value)
}

/// Like [`memoize`], but a computed `None` is returned without being stored
pub async fn memoize_optional<T, E, F, Fut>(
    cache: &dyn KeyValueCache,
    namespace: &str,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Option<T>, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    if let Some(hit) = lookup(cache, namespace, key).await {
        return Ok(Some(hit));
    }

    let value = compute().await?;
    if let Some(ref present) = value {
        store(cache, namespace, key, present, ttl).await;
    }
    Ok(value)
}
