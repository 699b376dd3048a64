//! Reconciliation worker: drains the settlement queue into the settlement store.

use std::sync::Arc;

use payments_app::config::WorkerConfig;
use payments_app::telemetry;
use payments_hex::ReconciliationWorker;
use payments_hex::inbound::shutdown_signal;
use payments_hex::outbound::{AmqpConsumer, AmqpSettings};
use payments_repo::build_repo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let telemetry = telemetry::init("reconciliation-worker")?;
    let config = WorkerConfig::from_env()?;

    tracing::info!(
        queue = %config.reconciliation_queue,
        retry_secs = config.retry_interval.as_secs(),
        "starting reconciliation worker"
    );

    let store = build_repo(&config.database_url).await?;
    let source = Arc::new(AmqpConsumer::new(AmqpSettings::new(
        config.rabbitmq_url,
        config.reconciliation_queue,
    )));

    ReconciliationWorker::new(store, source)
        .with_retry_interval(config.retry_interval)
        .run_until(shutdown_signal())
        .await;

    telemetry.shutdown();
    Ok(())
}
