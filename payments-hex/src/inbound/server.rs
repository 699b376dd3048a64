//! HTTP Server configuration and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payments_types::PaymentRepository;

use super::handlers::{self, AppState};
use super::rate_limit::{PRUNE_INTERVAL, RateLimiterState, rate_limit_middleware};
use crate::PaymentService;
use crate::openapi::ApiDoc;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

/// HTTP front of the payment orchestrator.
pub struct HttpServer<R: PaymentRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: PaymentRepository> HttpServer<R> {
    pub fn new(service: PaymentService<R>) -> Self {
        Self::with_rate_limit(service, DEFAULT_REQUESTS_PER_MINUTE)
    }

    /// Throttles each caller identity to `requests_per_minute`.
    pub fn with_rate_limit(service: PaymentService<R>, requests_per_minute: u32) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    fn payment_routes() -> Router<Arc<AppState<R>>> {
        Router::new()
            .route("/payment/tokenize", post(handlers::tokenize::<R>))
            .route("/payment/charge", post(handlers::charge::<R>))
            .route("/payments", post(handlers::create_payment::<R>))
            .route("/sign", post(handlers::sign::<R>))
            .route("/payment/sign", post(handlers::sign::<R>))
            .route("/public-key", get(handlers::public_key::<R>))
            .route("/payment/public-key", get(handlers::public_key::<R>))
    }

    /// Builds the Axum router: payment routes, health probes and API docs.
    pub fn router(&self) -> Router {
        // HTTP metrics go to the globally installed MeterProvider.
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();
        let docs = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

        Self::payment_routes()
            .route("/health", get(handlers::health::<R>))
            .route("/payment/health", get(handlers::health::<R>))
            .merge(docs)
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serves until Ctrl+C or SIGTERM, then drains in-flight requests.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            provider = self.state.service.provider(),
            "payment API listening"
        );

        let pruning = self.rate_limiter.spawn_pruning(PRUNE_INTERVAL);
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;
        pruning.abort();
        served?;

        tracing::info!("payment API stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.expect("failed to install Ctrl+C handler");
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");

    tracing::info!("shutdown signal received");
}
