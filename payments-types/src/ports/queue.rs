//! Reconciliation queue ports.

use crate::domain::SettlementMessage;
use crate::error::QueueError;

#[async_trait::async_trait]
pub trait ReceiptPublisher: Send + Sync + 'static {
    /// Publishes durably; returns once the broker has confirmed.
    async fn publish(&self, message: &SettlementMessage) -> Result<(), QueueError>;
}

/// One delivery from the queue.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub body: Vec<u8>,
    pub delivery_tag: u64,
}

/// An open consumer on the reconciliation queue.
#[async_trait::async_trait]
pub trait Subscription: Send {
    /// `None` when the consumer stream has ended (connection lost).
    async fn next_message(&mut self) -> Option<Result<InboundMessage, QueueError>>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError>;
}

#[async_trait::async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Connects and starts consuming.
    async fn subscribe(&self) -> Result<Box<dyn Subscription>, QueueError>;
}
