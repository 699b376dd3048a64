//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

pub(crate) mod handlers;
mod identity;
mod rate_limit;
mod server;

pub use handlers::ApiError;
pub use identity::Caller;
pub use rate_limit::RateLimiterState;
pub use server::{DEFAULT_REQUESTS_PER_MINUTE, HttpServer, shutdown_signal};
