//! Checker and notifier connected through the queue

use std::sync::Arc;
use std::time::Duration;

use horus::{
    Measurement,
    alerts::AlertManager,
    backoff::ReconnectPolicy,
    config::{Alert, Discord},
    notifier::{DeliveryOutcome, Notifier, NotifierStats},
    queue::{QueueConnector, QueueProducer, codec, memory::MemoryQueue},
    storage::{StorageBackend, memory::MemoryBackend},
};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::http_runner;

fn discord_notifier(queue: &MemoryQueue, webhook: &MockServer) -> Notifier {
    let alerts = AlertManager::new(Alert::Discord(Discord {
        url: format!("{}/webhook", webhook.uri()),
        user_id: None,
    }))
    .unwrap();

    Notifier::new(
        Arc::new(queue.clone()),
        Arc::new(alerts),
        ReconnectPolicy::default(),
        64,
    )
    .with_alert_retry(ReconnectPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        jitter: false,
    })
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..100 {
        if server.received_requests().await.unwrap_or_default().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} webhook calls");
}

#[tokio::test]
async fn test_only_down_sites_raise_alerts() {
    let sites = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&sites)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&sites)
        .await;

    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&webhook)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    storage
        .insert_endpoint(&format!("{}/up", sites.uri()))
        .await
        .unwrap();
    let down = storage
        .insert_endpoint(&format!("{}/down", sites.uri()))
        .await
        .unwrap();

    let queue = MemoryQueue::new();
    let report = http_runner(storage, &queue, 2).run_cycle(1).await.unwrap();
    assert_eq!(report.published, 2);

    let mut notifier = discord_notifier(&queue, &webhook);
    let consumer = tokio::spawn(async move {
        let _ = notifier.run().await;
    });

    wait_for_requests(&webhook, 1).await;
    // give a second, unwanted alert the chance to show up
    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer.abort();

    webhook.verify().await;
    let requests = webhook.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let fields = &body["embeds"][0]["fields"];
    assert_eq!(fields[0]["name"], "Site ID");
    assert_eq!(fields[0]["value"], down.id.to_string());
    assert_eq!(fields[1]["name"], "URL");
    assert_eq!(fields[1]["value"], format!("{}/down", sites.uri()));
    assert_eq!(fields[3]["value"], "502");
    assert_eq!(queue.stats().acked(), 2);
}

#[tokio::test]
async fn test_four_field_message_still_alerts() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let queue = MemoryQueue::new();
    queue
        .publish(br#"{"SiteID":3,"IsUp":false,"StatusCode":0,"ResponseTimeMs":5000}"#)
        .await
        .unwrap();

    let mut notifier = discord_notifier(&queue, &webhook);
    let mut consumer = queue.connect().await.unwrap();
    let delivery = consumer.next_delivery().await.unwrap().unwrap();

    assert_eq!(
        notifier.handle_delivery(delivery).await,
        DeliveryOutcome::Alerted
    );
    webhook.verify().await;
}

#[tokio::test]
async fn test_webhook_outage_requeues_until_delivered() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&webhook)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&webhook)
        .await;

    let queue = MemoryQueue::new();
    let measurement = Measurement::failed(11, 5000).with_checked_at(chrono::Utc::now());
    queue
        .publish(&codec::encode(&measurement).unwrap())
        .await
        .unwrap();

    let mut notifier = discord_notifier(&queue, &webhook);
    let consumer = tokio::spawn(async move {
        let _ = notifier.run().await;
    });

    wait_for_requests(&webhook, 3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    consumer.abort();

    let stats = queue.stats();
    assert_eq!(stats.requeued(), 2);
    assert_eq!(stats.acked(), 1);
    assert_eq!(webhook.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_garbage_message_then_down_site_alerts_once() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&webhook)
        .await;

    let queue = MemoryQueue::new();
    queue.publish(b"{not json").await.unwrap();
    queue
        .publish(&codec::encode(&Measurement::completed(21, 503, 40)).unwrap())
        .await
        .unwrap();

    let mut notifier = discord_notifier(&queue, &webhook);
    let result = tokio::time::timeout(Duration::from_millis(500), notifier.run()).await;
    assert!(result.is_err());

    assert_eq!(
        notifier.stats(),
        NotifierStats {
            received: 2,
            malformed: 1,
            alerted: 1,
            ..NotifierStats::default()
        }
    );
    webhook.verify().await;
    assert_eq!(queue.stats().acked(), 2);
}

#[tokio::test]
async fn test_rejecting_webhook_is_given_up_on() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&webhook)
        .await;

    let queue = MemoryQueue::new();
    queue
        .publish(&codec::encode(&Measurement::completed(22, 500, 15)).unwrap())
        .await
        .unwrap();

    let mut notifier = discord_notifier(&queue, &webhook);
    let result = tokio::time::timeout(Duration::from_millis(800), notifier.run()).await;
    assert!(result.is_err());

    webhook.verify().await;
    let stats = notifier.stats();
    assert_eq!(stats.requeued, 2);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(queue.stats().acked(), 1);
}
