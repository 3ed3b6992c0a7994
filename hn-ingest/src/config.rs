//! Configuration for hn-ingest
//!
//! Bootstrap settings come from a TOML file; every field has a built-in
//! default so an absent file yields a runnable configuration. Command-line
//! and environment overrides are applied by `main` on top of the loaded file.
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [upstream]
//! base_url = "https://hacker-news.firebaseio.com/v0"
//! max_concurrent_requests = 10
//!
//! [retry]
//! max_attempts = 3
//! ```

use hn_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "HN_INGEST_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub workers: WorkerConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data folder>/hn_ingest.db`
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    /// Upper bound on lock-contention retries of the upsert transaction
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 10,
            max_lock_wait_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| hn_common::config::default_data_folder().join("hn_ingest.db"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub requests_per_second: u32,
    /// Concurrent item fetches per job (K)
    pub max_concurrent_requests: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hacker-news.firebaseio.com/v0".to_string(),
            user_agent: format!("hn-ingest/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            requests_per_second: 25,
            max_concurrent_requests: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL; the in-memory cache is used when unset
    pub redis_url: Option<String>,
    /// Upstream response memoization TTL
    pub ttl_seconds: u64,
    /// Retention of job progress records and results
    pub progress_ttl_seconds: u64,
    /// How often the in-memory cache drops expired entries
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_seconds: 300,
            progress_ttl_seconds: 3600,
            sweep_interval_seconds: 30,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
    /// Deliveries of a job whose worker task panicked
    pub max_deliveries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 2,
            max_deliveries: 2,
        }
    }
}

/// Inbound requests allowed per client per minute; 0 means unlimited
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// POST /fetch
    pub fetch_per_minute: u32,
    /// GET /fetch/:task_id and its result
    pub status_per_minute: u32,
    /// GET /data
    pub data_per_minute: u32,
    /// GET /health
    pub health_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_per_minute: 10,
            status_per_minute: 30,
            data_per_minute: 60,
            health_per_minute: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl IngestConfig {
    /// Load from the resolved config file, or defaults when none exists
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match hn_common::config::resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let config: IngestConfig = hn_common::config::load_toml_config(&path)?;
                Ok(config)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(IngestConfig::default())
            }
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(Error::Config("upstream.base_url must not be empty".to_string()));
        }
        if self.upstream.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "upstream.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.upstream.requests_per_second == 0 {
            return Err(Error::Config(
                "upstream.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.workers.count == 0 {
            return Err(Error::Config("workers.count must be at least 1".to_string()));
        }
        if self.workers.max_deliveries == 0 {
            return Err(Error::Config("workers.max_deliveries must be at least 1".to_string()));
        }
        Ok(())
    }
}
