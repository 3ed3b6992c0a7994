//! In-process cache backend

use super::{namespaced_key, CacheError, KeyValueCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Default spacing of expiry sweeps performed by writers
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Store {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Store {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// In-memory cache with lazy expiry
///
/// Expired entries are invisible to readers. A reader that hits one removes
/// it, and writers sweep the whole map at most once per sweep interval, so
/// the map stays bounded by what was written within one TTL window.
#[derive(Debug)]
pub struct InMemoryCache {
    store: RwLock<Store>,
    sweep_interval: Duration,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            store: RwLock::new(Store {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            sweep_interval,
        }
    }

    /// Remove all expired entries, returns the number removed
    pub async fn purge_expired(&self) -> usize {
        self.store.write().await.sweep(Instant::now())
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.store
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn evict_if_expired(&self, cache_key: &str) {
        let mut store = self.store.write().await;
        if store
            .entries
            .get(cache_key)
            .is_some_and(|entry| !entry.is_live(Instant::now()))
        {
            store.entries.remove(cache_key);
        }
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        let cache_key = namespaced_key(namespace, key);

        let expired = {
            let store = self.store.read().await;
            match store.entries.get(&cache_key) {
                Some(entry) if entry.is_live(Instant::now()) => {
                    tracing::trace!(key = %cache_key, "Cache HIT");
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.evict_if_expired(&cache_key).await;
        }

        tracing::trace!(key = %cache_key, "Cache MISS");
        Ok(None)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let cache_key = namespaced_key(namespace, key);
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        let mut store = self.store.write().await;
        if now.duration_since(store.last_sweep) >= self.sweep_interval {
            let removed = store.sweep(now);
            if removed > 0 {
                tracing::debug!(removed, remaining = store.entries.len(), "Swept expired cache entries");
            }
        }
        store.entries.insert(cache_key, entry);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let cache_key = namespaced_key(namespace, key);
        let removed = self.store.write().await.entries.remove(&cache_key);
        Ok(removed.map(|entry| entry.is_live(Instant::now())).unwrap_or(false))
    }
}
