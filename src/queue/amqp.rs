//! RabbitMQ transport via lapin
//!
//! Both sides declare the same durable queue, so whichever process starts first creates
//! it. Messages are published to the default exchange with the queue name as routing key
//! and marked persistent. The consumer uses manual acknowledgement.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, instrument, warn};

use super::codec::CONTENT_TYPE;
use super::{
    Acknowledger, Delivery, QueueConnector, QueueConsumer, QueueError, QueueProducer,
    QueueResult,
};

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT: u8 = 2;

const CONSUMER_TAG: &str = "horus-notifier";

/// Unacknowledged deliveries the broker may push to one consumer
const DEFAULT_PREFETCH: u16 = 16;

async fn open_channel(url: &str) -> QueueResult<(Connection, Channel)> {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))?;
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))?;
    Ok((connection, channel))
}

async fn declare_queue(channel: &Channel, queue: &str) -> QueueResult<()> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| QueueError::Declare(e.to_string()))?;
    debug!("declared durable queue {queue}");
    Ok(())
}

/// Publisher connection to a durable queue
pub struct AmqpProducer {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpProducer {
    #[instrument(skip(url))]
    pub async fn connect(url: &str, queue: &str) -> QueueResult<Self> {
        let (connection, channel) = open_channel(url).await?;
        declare_queue(&channel, queue).await?;

        // publishes resolve only once the broker has taken responsibility for the message
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::Declare(e.to_string()))?;
        info!("connected to broker, publishing to {queue}");

        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    pub async fn close(&self) {
        if let Err(e) = self.channel.close(200, "bye").await {
            warn!("failed to close channel: {e}");
        }
        if let Err(e) = self.connection.close(200, "bye").await {
            warn!("failed to close connection: {e}");
        }
    }
}

#[async_trait]
impl QueueProducer for AmqpProducer {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT);

        let confirm = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        let confirmation = confirm
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        confirmed(confirmation)
    }
}

fn confirmed(confirmation: Confirmation) -> QueueResult<()> {
    if confirmation.is_nack() {
        return Err(QueueError::Publish(
            "broker refused responsibility for the message".to_string(),
        ));
    }
    Ok(())
}

/// Opens consumer connections for the notifier
#[derive(Debug, Clone)]
pub struct AmqpConnector {
    url: String,
    queue: String,
    prefetch: u16,
}

impl AmqpConnector {
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            prefetch: DEFAULT_PREFETCH,
        }
    }

    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch;
        self
    }
}

#[async_trait]
impl QueueConnector for AmqpConnector {
    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn connect(&self) -> QueueResult<Box<dyn QueueConsumer>> {
        let (connection, channel) = open_channel(&self.url).await?;
        declare_queue(&channel, &self.queue).await?;

        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::Declare(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Declare(e.to_string()))?;

        info!("consuming from {}", self.queue);

        Ok(Box::new(AmqpConsumer {
            _connection: connection,
            _channel: channel,
            consumer,
        }))
    }
}

struct AmqpConsumer {
    // kept alive for as long as the consumer is
    _connection: Connection,
    _channel: Channel,
    consumer: lapin::Consumer,
}

#[async_trait]
impl QueueConsumer for AmqpConsumer {
    async fn next_delivery(&mut self) -> Option<QueueResult<Delivery>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| Delivery::new(delivery.data, AmqpAcker(delivery.acker)))
                .map_err(|e| QueueError::Transport(e.to_string())),
        )
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Acknowledge(e.to_string()))
    }

    async fn requeue(&self) -> QueueResult<()> {
        self.0
            .nack(BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Acknowledge(e.to_string()))
    }
}
