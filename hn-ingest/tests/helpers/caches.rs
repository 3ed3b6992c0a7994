//! Cache doubles

use async_trait::async_trait;
use hn_common::cache::InMemoryCache;
use hn_common::{CacheError, KeyValueCache};
use std::sync::Mutex;
use std::time::Duration;

/// Every operation fails as if the backend were down
pub struct FailingCache;

#[async_trait]
impl KeyValueCache for FailingCache {
    async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _namespace: &str, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

/// In-memory cache that remembers every write
#[derive(Default)]
pub struct RecordingCache {
    inner: InMemoryCache,
    writes: Mutex<Vec<(String, String, String)>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write as `(namespace, key, value)`, oldest first
    pub fn writes(&self) -> Vec<(String, String, String)> {
        self.writes.lock().unwrap().clone()
    }

    /// Values written under `namespace`/`key`, oldest first
    pub fn writes_for(&self, namespace: &str, key: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(ns, k, _)| ns == namespace && k == key)
            .map(|(_, _, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl KeyValueCache for RecordingCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.writes
            .lock()
            .unwrap()
            .push((namespace.to_string(), key.to_string(), value.to_string()));
        self.inner.set(namespace, key, value, ttl).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        self.inner.delete(namespace, key).await
    }
}
