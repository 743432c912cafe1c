//! Result sink: persist and publish every measurement
//!
//! The two effects are independent. A storage failure does not stop the publish and a
//! publish failure does not undo the write; both are logged and counted, never raised.

use std::sync::Arc;

use tracing::{error, instrument, trace};

use super::publisher::Publisher;
use crate::Measurement;
use crate::storage::StorageBackend;

/// What happened to one measurement in the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOutcome {
    pub persisted: bool,
    pub published: bool,
}

#[derive(Clone)]
pub struct ResultSink {
    storage: Arc<dyn StorageBackend>,
    publisher: Publisher,
}

impl ResultSink {
    pub fn new(storage: Arc<dyn StorageBackend>, publisher: Publisher) -> Self {
        Self { storage, publisher }
    }

    #[instrument(skip(self, measurement), fields(endpoint_id = measurement.endpoint_id))]
    pub async fn handle(&self, measurement: &Measurement) -> SinkOutcome {
        let persisted = match self.storage.record_measurement(measurement).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to save health check for endpoint {}: {}",
                    measurement.endpoint_id, e
                );
                false
            }
        };

        let published = match self.publisher.publish(measurement).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to publish message for endpoint {}: {}",
                    measurement.endpoint_id, e
                );
                false
            }
        };

        trace!("handled measurement (persisted: {persisted}, published: {published})");
        SinkOutcome {
            persisted,
            published,
        }
    }
}
