//! Pipeline against a SQLite database file

use std::sync::Arc;

use horus::{
    queue::memory::MemoryQueue,
    storage::{EndpointStatus, StorageBackend, sqlite::SqliteBackend},
};
use tempfile::tempdir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::http_runner;

#[tokio::test]
async fn test_measurements_survive_reopen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("horus.db");

    let endpoint_id = {
        let storage = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let endpoint = storage.insert_endpoint(&server.uri()).await.unwrap();

        let runner = http_runner(storage.clone(), &MemoryQueue::new(), 4);
        runner.run_cycle(1).await.unwrap();
        runner.run_cycle(2).await.unwrap();

        storage.close().await.unwrap();
        endpoint.id
    };

    let storage = SqliteBackend::new(&db_path).await.unwrap();
    let endpoints = storage.list_endpoints().await.unwrap();
    assert_eq!(endpoints.len(), 1);

    let rows = storage.recent_measurements(endpoint_id, 10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.is_up && row.status_code == 200));

    let latest = storage.latest_measurement(endpoint_id).await.unwrap();
    assert_eq!(
        EndpointStatus::from_latest(latest.as_ref()),
        EndpointStatus::Up
    );
}

#[tokio::test]
async fn test_down_site_status_derived_from_latest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let storage = Arc::new(SqliteBackend::new(dir.path().join("horus.db")).await.unwrap());
    let endpoint = storage.insert_endpoint(&server.uri()).await.unwrap();

    assert_eq!(
        EndpointStatus::from_latest(storage.latest_measurement(endpoint.id).await.unwrap().as_ref()),
        EndpointStatus::Unknown
    );

    http_runner(storage.clone(), &MemoryQueue::new(), 1)
        .run_cycle(1)
        .await
        .unwrap();

    let latest = storage.latest_measurement(endpoint.id).await.unwrap();
    assert_eq!(
        EndpointStatus::from_latest(latest.as_ref()),
        EndpointStatus::Down
    );
    assert_eq!(latest.unwrap().status_code, 503);
}
