//! Notifier consumer: turns down measurements from the durable queue into alerts
//!
//! ## States
//!
//! ```text
//! Connecting ──(connect + declare + consume)──► Consuming ──(stream error / closed)──► stopped
//!     │  retried with exponential backoff
//!     └─ attempts exhausted ──► NotifierError::ConnectExhausted
//! ```
//!
//! Every delivery is acknowledged only after it has been handled. A down measurement whose
//! alert could not be sent is requeued after a backoff delay, so alerting is at-least-once;
//! the [`AlertLedger`] keeps redeliveries of an already alerted probe from alerting twice.
//! Once the alert retry budget for a message is spent it is acknowledged and dropped.

mod ledger;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, trace, warn};

pub use ledger::{AlertKey, AlertLedger, FailureCounts};

use crate::alerts::AlertSink;
use crate::backoff::{self, ReconnectPolicy};
use crate::queue::{Delivery, QueueConnector, QueueConsumer, QueueError, codec};

/// Terminal notifier failures
#[derive(Debug)]
pub enum NotifierError {
    /// Could not reach the broker within the retry budget
    ConnectExhausted(QueueError),

    /// The transport failed while consuming
    Transport(QueueError),

    /// The broker closed the delivery stream
    StreamClosed,
}

impl fmt::Display for NotifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierError::ConnectExhausted(err) => {
                write!(f, "giving up on the broker: {}", err)
            }
            NotifierError::Transport(err) => write!(f, "consumer failed: {}", err),
            NotifierError::StreamClosed => write!(f, "delivery stream closed by the broker"),
        }
    }
}

impl std::error::Error for NotifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifierError::ConnectExhausted(err) | NotifierError::Transport(err) => Some(err),
            NotifierError::StreamClosed => None,
        }
    }
}

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Not a valid measurement; acknowledged and dropped
    Malformed,

    /// The endpoint was up; acknowledged, no alert
    Healthy,

    /// The endpoint was down and the alert went out; acknowledged
    Alerted,

    /// This probe was already alerted on; acknowledged, no alert
    Duplicate,

    /// The alert failed; handed back to the broker for redelivery
    Requeued,

    /// The alert kept failing until the retry budget ran out; acknowledged and dropped
    Abandoned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifierStats {
    pub received: u64,
    pub malformed: u64,
    pub healthy: u64,
    pub alerted: u64,
    pub duplicates: u64,
    pub requeued: u64,
    pub abandoned: u64,
}

impl NotifierStats {
    fn count(&mut self, outcome: DeliveryOutcome) {
        self.received += 1;
        match outcome {
            DeliveryOutcome::Malformed => self.malformed += 1,
            DeliveryOutcome::Healthy => self.healthy += 1,
            DeliveryOutcome::Alerted => self.alerted += 1,
            DeliveryOutcome::Duplicate => self.duplicates += 1,
            DeliveryOutcome::Requeued => self.requeued += 1,
            DeliveryOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

pub struct Notifier {
    connector: Arc<dyn QueueConnector>,
    alerts: Arc<dyn AlertSink>,
    policy: ReconnectPolicy,
    alert_retry: ReconnectPolicy,
    ledger: AlertLedger,
    failures: FailureCounts,
    stats: NotifierStats,
}

impl Notifier {
    pub fn new(
        connector: Arc<dyn QueueConnector>,
        alerts: Arc<dyn AlertSink>,
        policy: ReconnectPolicy,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            connector,
            alerts,
            policy,
            alert_retry: ReconnectPolicy::default(),
            ledger: AlertLedger::new(dedup_capacity),
            failures: FailureCounts::new(dedup_capacity),
            stats: NotifierStats::default(),
        }
    }

    /// Delay and attempt budget for alerts that fail to send
    pub fn with_alert_retry(mut self, alert_retry: ReconnectPolicy) -> Self {
        self.alert_retry = alert_retry;
        self
    }

    pub fn stats(&self) -> NotifierStats {
        self.stats
    }

    /// Connect, then consume until the transport gives out
    ///
    /// Only returns with an error; a healthy notifier runs until it is dropped.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), NotifierError> {
        let consumer = self.connect().await?;
        self.consume(consumer).await
    }

    /// Connecting state
    pub async fn connect(&self) -> Result<Box<dyn QueueConsumer>, NotifierError> {
        let consumer = backoff::retry(&self.policy, "broker connection", || {
            self.connector.connect()
        })
        .await
        .map_err(NotifierError::ConnectExhausted)?;

        info!("connected, waiting for health check results");
        Ok(consumer)
    }

    /// Consuming state
    pub async fn consume(
        &mut self,
        mut consumer: Box<dyn QueueConsumer>,
    ) -> Result<(), NotifierError> {
        loop {
            match consumer.next_delivery().await {
                Some(Ok(delivery)) => {
                    let outcome = self.handle_delivery(delivery).await;
                    self.stats.count(outcome);
                }
                Some(Err(e)) => {
                    error!("consumer failed: {}", e);
                    return Err(NotifierError::Transport(e));
                }
                None => {
                    warn!("delivery stream closed");
                    return Err(NotifierError::StreamClosed);
                }
            }
        }
    }

    /// Decode, alert if down, then settle the delivery with the broker
    pub async fn handle_delivery(&mut self, delivery: Delivery) -> DeliveryOutcome {
        let measurement = match codec::decode(&delivery.body) {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!("dropping malformed message: {}", e);
                settle_ack(delivery).await;
                return DeliveryOutcome::Malformed;
            }
        };

        if measurement.is_up {
            trace!("endpoint {} is up", measurement.endpoint_id);
            settle_ack(delivery).await;
            return DeliveryOutcome::Healthy;
        }

        let key = AlertKey::of(&measurement);
        if let Some(key) = &key
            && self.ledger.contains(key)
        {
            debug!(
                "already alerted on endpoint {} for this check, skipping",
                measurement.endpoint_id
            );
            settle_ack(delivery).await;
            return DeliveryOutcome::Duplicate;
        }

        info!(
            "endpoint {} is down (status {}), sending alert",
            measurement.endpoint_id, measurement.status_code
        );
        match self.alerts.send_down_alert(&measurement).await {
            Ok(()) => {
                if let Some(key) = key {
                    self.ledger.record(key);
                }
                self.failures.clear(&delivery.body);
                settle_ack(delivery).await;
                DeliveryOutcome::Alerted
            }
            Err(e) => {
                let attempt = self.failures.increment(&delivery.body);
                let Some(delay) = self.alert_retry.delay_after(attempt) else {
                    error!(
                        "failed to alert on endpoint {} after {} attempts, dropping: {:#}",
                        measurement.endpoint_id, attempt, e
                    );
                    self.failures.clear(&delivery.body);
                    settle_ack(delivery).await;
                    return DeliveryOutcome::Abandoned;
                };

                warn!(
                    "failed to alert on endpoint {} (attempt {}): {:#}, requeueing in {:?}",
                    measurement.endpoint_id, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
                if let Err(e) = delivery.requeue().await {
                    error!("failed to requeue message: {}", e);
                }
                DeliveryOutcome::Requeued
            }
        }
    }
}

async fn settle_ack(delivery: Delivery) {
    // an unacknowledged message is redelivered once the channel drops; nothing else to do
    if let Err(e) = delivery.ack().await {
        error!("failed to acknowledge message: {}", e);
    }
}
