//! Hands measurements to the durable queue
//!
//! Delivery is at-most-once from here: a failed or timed-out publish is reported to the
//! caller and never retried. Once the broker accepted a message it is the broker's job
//! to keep it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{instrument, trace};

use crate::Measurement;
use crate::queue::{QueueError, QueueProducer, QueueResult, codec};

/// Default deadline for a single publish
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Publisher {
    producer: Arc<dyn QueueProducer>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(producer: Arc<dyn QueueProducer>, timeout: Duration) -> Self {
        Self { producer, timeout }
    }

    /// Encode and publish one measurement, giving the broker at most `timeout`
    #[instrument(skip(self, measurement), fields(endpoint_id = measurement.endpoint_id))]
    pub async fn publish(&self, measurement: &Measurement) -> QueueResult<()> {
        let body = codec::encode(measurement)?;

        match tokio::time::timeout(self.timeout, self.producer.publish(&body)).await {
            Ok(Ok(())) => {
                trace!("sent message for endpoint {}", measurement.endpoint_id);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(QueueError::Timeout(self.timeout)),
        }
    }
}
