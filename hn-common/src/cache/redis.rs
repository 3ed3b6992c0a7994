//! Redis cache backend (enabled with the `redis` feature)

use super::{namespaced_key, CacheError, KeyValueCache};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::Mutex;

/// Redis-backed cache using `SET ... EX` for expiry
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    /// Create a cache for the given URL (e.g. `redis://localhost:6379/0`).
    ///
    /// No connection is opened until the first command.
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the shared connection so the next command reconnects
    async fn reset(&self) {
        *self.connection.lock().await = None;
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, CacheError> {
        let mut conn = self.connection().await?;
        match cmd.query_async::<_, T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    self.reset().await;
                }
                Err(CacheError::Backend(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(namespaced_key(namespace, key));
        self.run(cmd).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(namespaced_key(namespace, key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1));
        self.run::<()>(cmd).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(namespaced_key(namespace, key));
        let removed: i64 = self.run(cmd).await?;
        Ok(removed > 0)
    }
}
