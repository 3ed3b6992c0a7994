//! Attempt-bounded retry with exponential backoff
//!
//! Used for upstream HTTP calls. Only errors that report themselves as
//! transient are retried; everything else is returned on the first failure.
//!
//! **Backoff Strategy:**
//! - Delay before attempt n+1: `base_delay * 2^(n-1)`
//! - Capped at `max_delay`
//! - Optional jitter of up to 10% of the delay (still capped)

use crate::config::RetryConfig;
use crate::error::UpstreamError;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that can tell whether another attempt might succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for UpstreamError {
    fn is_transient(&self) -> bool {
        UpstreamError::is_transient(self)
    }
}

/// Retry parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: true,
        }
    }

    /// Delay before the attempt following `failed_attempts` failures (without jitter)
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let multiplier = 1u32 << exponent;
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_with_jitter(&self, failed_attempts: u32) -> Duration {
        let delay = self.backoff_for(failed_attempts);
        if !self.jitter {
            return delay;
        }

        let jitter_ms = (delay.as_millis() / 10) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "fetch item 42")
/// * `policy` - Attempt limit and backoff parameters
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_transient() {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Permanent failure, not retrying"
                    );
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Giving up: retry attempts exhausted"
                    );
                    return Err(err);
                }

                let delay = policy.delay_with_jitter(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
