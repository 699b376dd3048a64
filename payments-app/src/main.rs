//! Payment API server.
//!
//! - Load configuration from environment
//! - Provision the HSM keys
//! - Initialize the payment store
//! - Wire the order service, fraud engine, PSP and settlement queue adapters
//! - Start the HTTP server

use std::sync::Arc;

use payments_app::config::{PspConfig, ServerConfig};
use payments_app::{crypto, telemetry};
use payments_hex::outbound::{
    AmqpPublisher, AmqpSettings, HttpFraudGateway, HttpOrderGateway, MockPsp, StripePsp,
    http_client,
};
use payments_hex::{PaymentService, inbound::HttpServer};
use payments_repo::build_repo;
use payments_types::PspAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let telemetry = telemetry::init("payments-service")?;
    let config = ServerConfig::from_env()?;

    tracing::info!(
        port = config.port,
        psp = config.psp.provider(),
        hsm = ?config.hsm.backend,
        "starting payments server"
    );

    let crypto = crypto::build_crypto(&config.hsm).await?;

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    let client = http_client(config.upstream_timeout)?;
    let orders = Arc::new(HttpOrderGateway::new(
        client.clone(),
        &config.order_service_url,
    ));
    let fraud = Arc::new(HttpFraudGateway::new(
        client.clone(),
        &config.fraud_engine_url,
    ));
    let psp: Arc<dyn PspAdapter> = match &config.psp {
        PspConfig::Mock => Arc::new(MockPsp),
        PspConfig::Stripe {
            api_url,
            secret_key,
        } => Arc::new(StripePsp::new(client, api_url, secret_key)),
    };
    let publisher = Arc::new(AmqpPublisher::new(
        AmqpSettings::new(&config.rabbitmq_url, &config.reconciliation_queue)
            .with_timeout(config.upstream_timeout),
    ));

    let service = PaymentService::new(repo, crypto, orders, fraud, psp, publisher)
        .with_publish_timeout(config.upstream_timeout);

    let server = HttpServer::with_rate_limit(service, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);
    let result = server.run(&addr).await;

    // Ensure traces are flushed before exit
    telemetry.shutdown();
    result
}
