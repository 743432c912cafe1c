//! Probe behaviour against real HTTP endpoints

use std::time::Duration;

use horus::{
    NO_RESPONSE_STATUS,
    probe::{HttpProbe, Probe},
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{TEST_PROBE_TIMEOUT, endpoint};

#[tokio::test]
async fn test_healthy_endpoint_is_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(20)))
        .expect(1)
        .mount(&server)
        .await;

    let probe = HttpProbe::new(TEST_PROBE_TIMEOUT).unwrap();
    let url = format!("{}/health", server.uri());
    let measurement = probe.probe(&endpoint(1, &url)).await;

    assert!(measurement.is_up);
    assert_eq!(measurement.status_code, 200);
    assert!(measurement.response_time_ms >= 20);
    assert!(measurement.response_time_ms < TEST_PROBE_TIMEOUT.as_millis() as u64);
    assert_eq!(measurement.url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_hung_endpoint_times_out_as_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_millis(200)).unwrap();
    let measurement = probe.probe(&endpoint(2, &server.uri())).await;

    assert!(!measurement.is_up);
    assert_eq!(measurement.status_code, NO_RESPONSE_STATUS);
    assert!(measurement.response_time_ms >= 200);
}

#[tokio::test]
async fn test_server_error_is_down_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(TEST_PROBE_TIMEOUT).unwrap();
    let measurement = probe.probe(&endpoint(3, &server.uri())).await;

    assert!(!measurement.is_up);
    assert_eq!(measurement.status_code, 503);
}

#[tokio::test]
async fn test_client_error_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(TEST_PROBE_TIMEOUT).unwrap();
    let measurement = probe.probe(&endpoint(4, &server.uri())).await;

    assert!(!measurement.is_up);
    assert_eq!(measurement.status_code, 404);
}
