//! Inbound request limits
//!
//! Each endpoint class (submit, status, data, health) has its own quota per
//! minute, tracked per client IP. Requests over quota are answered with
//! 429 and a `Retry-After` header before reaching the handler.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::ApiError;

type ClientRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Tracked clients beyond which idle entries are dropped
const RETAIN_THRESHOLD: usize = 10_000;

/// Quota for one endpoint class, `None` when unlimited
#[derive(Clone, Default)]
pub struct EndpointLimiter {
    endpoint: &'static str,
    limiter: Option<Arc<ClientRateLimiter>>,
}

impl EndpointLimiter {
    /// `per_minute == 0` disables the limit
    pub fn per_minute(endpoint: &'static str, per_minute: u32) -> Self {
        Self {
            endpoint,
            limiter: NonZeroU32::new(per_minute).map(|n| Arc::new(RateLimiter::keyed(Quota::per_minute(n)))),
        }
    }

    pub fn unlimited(endpoint: &'static str) -> Self {
        Self { endpoint, limiter: None }
    }

    /// Count one request from `client`; `Err` carries whole seconds to wait
    fn check(&self, client: IpAddr) -> Result<(), u64> {
        let Some(limiter) = self.limiter.as_ref() else {
            return Ok(());
        };

        if limiter.len() > RETAIN_THRESHOLD {
            limiter.retain_recent();
        }

        limiter.check_key(&client).map_err(|not_until| {
            let wait = not_until.wait_time_from(limiter.clock().now());
            wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
        })
    }
}

/// Limiters for every endpoint class
#[derive(Clone, Default)]
pub struct RateLimits {
    pub fetch: EndpointLimiter,
    pub status: EndpointLimiter,
    pub data: EndpointLimiter,
    pub health: EndpointLimiter,
}

impl RateLimits {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::unlimited();
        }

        Self {
            fetch: EndpointLimiter::per_minute("fetch", config.fetch_per_minute),
            status: EndpointLimiter::per_minute("status", config.status_per_minute),
            data: EndpointLimiter::per_minute("data", config.data_per_minute),
            health: EndpointLimiter::per_minute("health", config.health_per_minute),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            fetch: EndpointLimiter::unlimited("fetch"),
            status: EndpointLimiter::unlimited("status"),
            data: EndpointLimiter::unlimited("data"),
            health: EndpointLimiter::unlimited("health"),
        }
    }
}

/// Rate limiting middleware
///
/// Clients are identified by peer IP when the server was started with
/// connect info; otherwise all requests share one bucket.
pub async fn enforce_rate_limit(State(limiter): State<EndpointLimiter>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            warn!(
                endpoint = limiter.endpoint,
                client = %client,
                retry_after_secs,
                "Rate limit exceeded"
            );
            ApiError::RateLimited {
                endpoint: limiter.endpoint.to_string(),
                retry_after_secs,
            }
            .into_response()
        }
    }
}
