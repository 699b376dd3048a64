//! Reconciliation queue over AMQP (RabbitMQ).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, options::*,
    types::FieldTable,
};
use tokio::sync::Mutex;

use payments_types::{InboundMessage, MessageSource, QueueError, ReceiptPublisher, SettlementMessage, Subscription};

const CONSUMER_TAG: &str = "reconciliation-worker";

pub const DEFAULT_BROKER_TIMEOUT: Duration = Duration::from_secs(10);

/// Broker location and queue name.
#[derive(Debug, Clone)]
pub struct AmqpSettings {
    pub url: String,
    pub queue: String,
    /// Bound on opening a link and on each publish, confirm included.
    pub timeout: Duration,
}

impl AmqpSettings {
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            timeout: DEFAULT_BROKER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, QueueError>>,
) -> Result<T, QueueError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| {
            Err(QueueError::Connection(format!(
                "broker did not answer within {:?}",
                timeout
            )))
        })
}

struct Link {
    // Keeps the connection alive for as long as the channel is in use.
    _connection: Connection,
    channel: Channel,
}

async fn open_link(settings: &AmqpSettings) -> Result<Link, QueueError> {
    let connection = Connection::connect(&settings.url, ConnectionProperties::default())
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))?;
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))?;

    channel
        .queue_declare(
            &settings.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))?;

    Ok(Link {
        _connection: connection,
        channel,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Publisher
// ─────────────────────────────────────────────────────────────────────────────

/// Publishes settlement messages with publisher confirms.
///
/// Holds one connection, opened on first use and reopened after a failure.
pub struct AmqpPublisher {
    settings: AmqpSettings,
    link: Mutex<Option<Link>>,
}

impl AmqpPublisher {
    pub fn new(settings: AmqpSettings) -> Self {
        Self {
            settings,
            link: Mutex::new(None),
        }
    }

    async fn publish_on(&self, channel: &Channel, body: &[u8]) -> Result<(), QueueError> {
        let confirmation = channel
            .basic_publish(
                "",
                &self.settings.queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        if confirmation.is_nack() {
            return Err(QueueError::Publish("broker rejected the message".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReceiptPublisher for AmqpPublisher {
    #[tracing::instrument(skip(self, message), fields(queue = %self.settings.queue))]
    async fn publish(&self, message: &SettlementMessage) -> Result<(), QueueError> {
        let body =
            serde_json::to_vec(message).map_err(|e| QueueError::Serialization(e.to_string()))?;

        // The link guard is released when the bounded future is dropped.
        bounded(self.settings.timeout, async {
            let mut guard = self.link.lock().await;
            let stale = guard
                .as_ref()
                .is_none_or(|link| !link.channel.status().connected());
            if stale {
                let link = open_link(&self.settings).await?;
                link.channel
                    .confirm_select(ConfirmSelectOptions::default())
                    .await
                    .map_err(|e| QueueError::Connection(e.to_string()))?;
                *guard = Some(link);
            }

            let Some(link) = guard.as_ref() else {
                return Err(QueueError::Connection("no broker channel".into()));
            };
            let result = self.publish_on(&link.channel, &body).await;
            if result.is_err() {
                // Reconnect on the next publish.
                *guard = None;
            }
            result
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consumer
// ─────────────────────────────────────────────────────────────────────────────

/// Opens consumers on the reconciliation queue.
pub struct AmqpConsumer {
    settings: AmqpSettings,
}

impl AmqpConsumer {
    pub fn new(settings: AmqpSettings) -> Self {
        Self { settings }
    }
}

struct AmqpSubscription {
    link: Link,
    consumer: Consumer,
}

#[async_trait]
impl MessageSource for AmqpConsumer {
    async fn subscribe(&self) -> Result<Box<dyn Subscription>, QueueError> {
        let link = bounded(self.settings.timeout, open_link(&self.settings)).await?;
        let consumer = link
            .channel
            .basic_consume(
                &self.settings.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        tracing::info!(queue = %self.settings.queue, "consuming reconciliation queue");
        Ok(Box::new(AmqpSubscription { link, consumer }))
    }
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, QueueError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|d| InboundMessage {
                    body: d.data,
                    delivery_tag: d.delivery_tag,
                })
                .map_err(|e| QueueError::Consume(e.to_string())),
        )
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
        self.link
            .channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))
    }
}
