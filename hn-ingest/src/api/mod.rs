//! HTTP API handlers for hn-ingest
//!
//! - `POST /fetch`, `GET /fetch/:task_id`, `GET /fetch/:task_id/result`
//! - `GET /data`
//! - `GET /health`

pub mod data;
pub mod fetch;
pub mod health;
pub mod rate_limit;

pub use data::data_routes;
pub use fetch::fetch_routes;
pub use health::health_routes;
pub use rate_limit::RateLimits;
