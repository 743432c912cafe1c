//! Full cycles: snapshot, probe, persist, publish

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use horus::{
    Endpoint, Measurement,
    actors::{
        cycle::CycleRunner, messages::CycleError, publisher::Publisher, sink::ResultSink,
    },
    probe::HttpProbe,
    queue::{QueueError, QueueProducer, QueueResult, memory::MemoryQueue},
    storage::{
        MeasurementRow, StorageBackend, StorageError, StorageResult, backend::HealthStatus,
        memory::MemoryBackend,
    },
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{TEST_PROBE_TIMEOUT, drain, http_runner};

async fn mixed_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_cycle_checks_every_registered_site() {
    let server = mixed_server().await;
    let storage = Arc::new(MemoryBackend::new());
    let up_a = storage
        .insert_endpoint(&format!("{}/up", server.uri()))
        .await
        .unwrap();
    let up_b = storage
        .insert_endpoint(&format!("{}/up", server.uri()))
        .await
        .unwrap();
    let down = storage
        .insert_endpoint(&format!("{}/down", server.uri()))
        .await
        .unwrap();

    let queue = MemoryQueue::new();
    let runner = http_runner(storage.clone(), &queue, 2);

    let report = runner.run_cycle(1).await.unwrap();

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.received, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.published, 3);
    assert_eq!(report.down, 1);

    let rows = storage.measurements().await;
    assert_eq!(rows.len(), 3);

    let mut published = drain(&queue, 3).await;
    published.sort_by_key(|m| m.endpoint_id);
    let summary: Vec<(i64, bool, u16)> = published
        .iter()
        .map(|m| (m.endpoint_id, m.is_up, m.status_code))
        .collect();
    assert_eq!(
        summary,
        vec![(up_a.id, true, 200), (up_b.id, true, 200), (down.id, false, 500)]
    );
    assert_eq!(
        published[2].url.as_deref(),
        Some(format!("{}/down", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_unreachable_site_still_reported() {
    let storage = Arc::new(MemoryBackend::new());
    // bind and drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    storage
        .insert_endpoint(&format!("http://127.0.0.1:{port}/"))
        .await
        .unwrap();

    let queue = MemoryQueue::new();
    let report = http_runner(storage.clone(), &queue, 4)
        .run_cycle(1)
        .await
        .unwrap();

    assert_eq!(report.received, 1);
    assert_eq!(report.down, 1);
    let published = drain(&queue, 1).await;
    assert_eq!(published[0].status_code, 0);
}

#[tokio::test]
async fn test_registered_after_snapshot_waits_for_next_cycle() {
    let server = mixed_server().await;
    let storage = Arc::new(MemoryBackend::new());
    storage
        .insert_endpoint(&format!("{}/up", server.uri()))
        .await
        .unwrap();

    let queue = MemoryQueue::new();
    let runner = http_runner(storage.clone(), &queue, 4);

    assert_eq!(runner.run_cycle(1).await.unwrap().dispatched, 1);

    storage
        .insert_endpoint(&format!("{}/down", server.uri()))
        .await
        .unwrap();
    assert_eq!(runner.run_cycle(2).await.unwrap().dispatched, 2);
    assert_eq!(storage.measurements().await.len(), 3);
}

struct OfflineStorage;

#[async_trait]
impl StorageBackend for OfflineStorage {
    async fn insert_endpoint(&self, _url: &str) -> StorageResult<Endpoint> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn get_endpoint(&self, _id: i64) -> StorageResult<Option<Endpoint>> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn record_measurement(&self, _measurement: &Measurement) -> StorageResult<()> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn recent_measurements(
        &self,
        _endpoint_id: i64,
        _limit: usize,
    ) -> StorageResult<Vec<MeasurementRow>> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Err(StorageError::ConnectionFailed("database offline".to_string()))
    }
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_snapshot_failure_abandons_cycle() {
    let queue = MemoryQueue::new();
    let runner = http_runner(Arc::new(OfflineStorage), &queue, 4);

    let result = runner.run_cycle(1).await;

    assert_matches!(result, Err(CycleError::Snapshot(StorageError::ConnectionFailed(_))));
    assert_eq!(queue.stats().published(), 0);
}

struct ClosedBroker;

#[async_trait]
impl QueueProducer for ClosedBroker {
    async fn publish(&self, _payload: &[u8]) -> QueueResult<()> {
        Err(QueueError::Closed)
    }
}

#[tokio::test]
async fn test_broker_outage_does_not_lose_history() {
    let server = mixed_server().await;
    let storage = Arc::new(MemoryBackend::new());
    for _ in 0..3 {
        storage
            .insert_endpoint(&format!("{}/up", server.uri()))
            .await
            .unwrap();
    }

    let sink = ResultSink::new(
        storage.clone(),
        Publisher::new(Arc::new(ClosedBroker), Duration::from_secs(1)),
    );
    let runner = CycleRunner::new(
        storage.clone(),
        Arc::new(HttpProbe::new(TEST_PROBE_TIMEOUT).unwrap()),
        sink,
        4,
    );

    let report = runner.run_cycle(1).await.unwrap();

    assert_eq!(report.received, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.published, 0);
    assert_eq!(storage.measurements().await.len(), 3);
}
