//! In-process queue
//!
//! Messages published before a consumer attaches are buffered. Requeued deliveries go
//! to the back of the queue. Only one consumer may be attached at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

use super::{
    Acknowledger, Delivery, QueueConnector, QueueConsumer, QueueError, QueueProducer,
    QueueResult,
};

/// Delivery counters, shared by every clone of a [`MemoryQueue`]
#[derive(Debug, Default)]
pub struct MemoryQueueStats {
    published: AtomicUsize,
    acked: AtomicUsize,
    requeued: AtomicUsize,
}

impl MemoryQueueStats {
    pub fn published(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn requeued(&self) -> usize {
        self.requeued.load(Ordering::SeqCst)
    }
}

/// Cloneable handle to one in-process queue
#[derive(Clone)]
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>>,
    stats: Arc<MemoryQueueStats>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
            stats: Arc::new(MemoryQueueStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MemoryQueueStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| QueueError::Closed)?;
        self.stats.published.fetch_add(1, Ordering::SeqCst);
        trace!("in-memory queue: published {} bytes", payload.len());
        Ok(())
    }
}

#[async_trait]
impl QueueConnector for MemoryQueue {
    async fn connect(&self) -> QueueResult<Box<dyn QueueConsumer>> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| QueueError::Connection("a consumer is already attached".to_string()))?;

        Ok(Box::new(MemoryConsumer {
            rx,
            tx: self.tx.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    stats: Arc<MemoryQueueStats>,
}

#[async_trait]
impl QueueConsumer for MemoryConsumer {
    async fn next_delivery(&mut self) -> Option<QueueResult<Delivery>> {
        let body = self.rx.recv().await?;
        let acker = MemoryAcker {
            body: body.clone(),
            tx: self.tx.clone(),
            stats: self.stats.clone(),
        };
        Some(Ok(Delivery::new(body, acker)))
    }
}

struct MemoryAcker {
    body: Vec<u8>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    stats: Arc<MemoryQueueStats>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.stats.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn requeue(&self) -> QueueResult<()> {
        self.tx
            .send(self.body.clone())
            .map_err(|_| QueueError::Closed)?;
        self.stats.requeued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
