//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use horus::{
    Endpoint, Measurement,
    actors::{cycle::CycleRunner, publisher::Publisher, sink::ResultSink},
    probe::HttpProbe,
    queue::{QueueConnector, codec, memory::MemoryQueue},
    storage::StorageBackend,
};

pub const TEST_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub fn endpoint(id: i64, url: &str) -> Endpoint {
    Endpoint {
        id,
        url: url.to_string(),
        created_at: Utc::now(),
    }
}

/// Cycle runner wired to real HTTP probes and the given storage, publishing into `queue`
pub fn http_runner(
    storage: Arc<dyn StorageBackend>,
    queue: &MemoryQueue,
    workers: usize,
) -> CycleRunner {
    let probe = HttpProbe::new(TEST_PROBE_TIMEOUT).unwrap();
    let sink = ResultSink::new(
        storage.clone(),
        Publisher::new(Arc::new(queue.clone()), Duration::from_secs(1)),
    );
    CycleRunner::new(storage, Arc::new(probe), sink, workers)
}

/// Attach to `queue` and decode the next `count` messages, acknowledging each
pub async fn drain(queue: &MemoryQueue, count: usize) -> Vec<Measurement> {
    let mut consumer = queue.connect().await.unwrap();
    let mut measurements = Vec::with_capacity(count);
    for _ in 0..count {
        let delivery = tokio::time::timeout(Duration::from_secs(1), consumer.next_delivery())
            .await
            .expect("queue ran dry")
            .unwrap()
            .unwrap();
        measurements.push(codec::decode(&delivery.body).unwrap());
        delivery.ack().await.unwrap();
    }
    measurements
}
