//! Reconciliation worker
//!
//! Single sequential consumer that stores signed receipts from the
//! reconciliation queue into the settlement store. Deliveries are
//! at-least-once; the unique receipt signature makes redelivery a no-op.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use payments_types::{
    MessageSource, ReceiptInsertOutcome, ReceiptRepository, ReconciliationError, RepoError,
    SettlementMessage, Subscription,
};

/// Default pause between broker reconnect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

pub struct ReconciliationWorker<S: ReceiptRepository> {
    store: S,
    source: Arc<dyn MessageSource>,
    retry_interval: Duration,
}

impl<S: ReceiptRepository> ReconciliationWorker<S> {
    pub fn new(store: S, source: Arc<dyn MessageSource>) -> Self {
        Self {
            store,
            source,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parses one delivery and stores its receipt.
    ///
    /// A receipt whose signature is already stored is `Duplicate`, not an error.
    #[tracing::instrument(skip(self, body), fields(len = body.len()))]
    pub async fn handle_message(
        &self,
        body: &[u8],
    ) -> Result<ReceiptInsertOutcome, ReconciliationError> {
        let record = SettlementMessage::parse(body)?.into_record();
        match self.store.store_receipt(&record).await {
            Ok(outcome) => Ok(outcome),
            Err(RepoError::Conflict(_)) => Ok(ReceiptInsertOutcome::Duplicate),
            Err(e) => Err(ReconciliationError::TransientPersistenceError(e.to_string())),
        }
    }

    /// Consumes forever. Never returns; broker outages are retried without limit.
    pub async fn run(&self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Consumes until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::select! {
            _ = self.supervise() => {}
            _ = shutdown => {
                tracing::info!("reconciliation worker stopping");
            }
        }
    }

    // Reconnect loop with no attempt limit.
    async fn supervise(&self) {
        loop {
            match self.source.subscribe().await {
                Ok(mut subscription) => {
                    self.consume(subscription.as_mut()).await;
                    tracing::warn!("reconciliation consumer stopped, reconnecting");
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = self.retry_interval.as_secs_f64(),
                        "broker unavailable"
                    );
                }
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn consume(&self, subscription: &mut dyn Subscription) {
        while let Some(next) = subscription.next_message().await {
            let message = match next {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "delivery failed");
                    return;
                }
            };

            match self.handle_message(&message.body).await {
                Ok(ReceiptInsertOutcome::Stored) => {
                    tracing::info!(delivery_tag = message.delivery_tag, "receipt reconciled");
                }
                Ok(ReceiptInsertOutcome::Duplicate) => {
                    tracing::info!(
                        delivery_tag = message.delivery_tag,
                        "receipt already reconciled, skipping"
                    );
                }
                Err(e @ ReconciliationError::MalformedReconciliationMessage(_)) => {
                    tracing::warn!(delivery_tag = message.delivery_tag, error = %e, "dropping message");
                }
                Err(e @ ReconciliationError::TransientPersistenceError(_)) => {
                    tracing::error!(delivery_tag = message.delivery_tag, error = %e, "receipt not stored");
                }
            }

            // Acked whatever the outcome; nothing is requeued from here.
            if let Err(e) = subscription.ack(message.delivery_tag).await {
                tracing::warn!(error = %e, "ack failed");
                return;
            }
        }
    }
}
