//! Durable queue boundary between the checker and the notifier
//!
//! The transport is opaque to the pipeline: the checker only needs to hand bytes to a
//! [`QueueProducer`], and the notifier only needs a [`QueueConnector`] that yields
//! acknowledgeable [`Delivery`] values.
//!
//! ## Implementations
//!
//! - **AMQP** (`amqp` feature): RabbitMQ via lapin, durable queue, manual acknowledgement
//! - **Memory**: in-process queue for tests and single-process runs

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod codec;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by the queue boundary
#[derive(Debug)]
pub enum QueueError {
    /// Could not reach the broker or open a channel
    Connection(String),

    /// The queue could not be declared or a consumer could not be registered
    Declare(String),

    /// The broker rejected or failed a publish
    Publish(String),

    /// A publish did not complete before its deadline
    Timeout(Duration),

    /// The transport failed while consuming
    Transport(String),

    /// Acknowledging or requeueing a delivery failed
    Acknowledge(String),

    /// The queue has been closed
    Closed,

    /// A measurement could not be serialized
    Encode(String),

    /// A message body is not a valid measurement
    Decode(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Connection(msg) => write!(f, "failed to connect to broker: {}", msg),
            QueueError::Declare(msg) => write!(f, "failed to declare queue: {}", msg),
            QueueError::Publish(msg) => write!(f, "publish failed: {}", msg),
            QueueError::Timeout(deadline) => {
                write!(f, "publish did not complete within {:?}", deadline)
            }
            QueueError::Transport(msg) => write!(f, "transport error: {}", msg),
            QueueError::Acknowledge(msg) => write!(f, "acknowledgement failed: {}", msg),
            QueueError::Closed => write!(f, "queue closed"),
            QueueError::Encode(msg) => write!(f, "failed to encode measurement: {}", msg),
            QueueError::Decode(msg) => write!(f, "failed to decode measurement: {}", msg),
        }
    }
}

impl std::error::Error for QueueError {}

/// Publishing side of the queue
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Place one message on the queue
    ///
    /// Returns once the broker has taken the message; no retries.
    async fn publish(&self, payload: &[u8]) -> QueueResult<()>;
}

/// Settles a delivery with the broker
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// The message is handled and can be dropped by the broker
    async fn ack(&self) -> QueueResult<()>;

    /// The message was not handled and should be delivered again
    async fn requeue(&self) -> QueueResult<()>;
}

/// One received message, not yet acknowledged
pub struct Delivery {
    pub body: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(body: Vec<u8>, acker: impl Acknowledger + 'static) -> Self {
        Self {
            body,
            acker: Box::new(acker),
        }
    }

    pub async fn ack(self) -> QueueResult<()> {
        self.acker.ack().await
    }

    pub async fn requeue(self) -> QueueResult<()> {
        self.acker.requeue().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Consuming side of an established queue connection
#[async_trait]
pub trait QueueConsumer: Send {
    /// Wait for the next message
    ///
    /// `None` means the transport closed the stream.
    async fn next_delivery(&mut self) -> Option<QueueResult<Delivery>>;
}

/// Establishes a consumer: connect, declare the durable queue, register for deliveries
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self) -> QueueResult<Box<dyn QueueConsumer>>;
}
