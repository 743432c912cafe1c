//! One health-check cycle: snapshot, fan out to a bounded worker pool, fan in
//!
//! ## Message Flow
//!
//! ```text
//! list_endpoints() → work queue (N endpoints) → min(workers, N) probe tasks
//!                                                    │
//!                                       mpsc, capacity N (workers never block)
//!                                                    ▼
//!                            aggregator: exactly N receives → ResultSink, one at a time
//! ```
//!
//! Every endpoint in the snapshot is probed exactly once. Endpoints registered after the
//! snapshot wait for the next cycle.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, error, info, instrument, trace};

use super::messages::{CycleError, CycleReport};
use super::sink::ResultSink;
use crate::probe::Probe;
use crate::storage::StorageBackend;
use crate::{Endpoint, Measurement};

/// Default size of the probe worker pool
pub const DEFAULT_WORKERS: usize = 16;

/// Runs cycles; shared by the scheduler between ticks
pub struct CycleRunner {
    storage: Arc<dyn StorageBackend>,
    probe: Arc<dyn Probe>,
    sink: ResultSink,
    workers: usize,
}

impl CycleRunner {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        probe: Arc<dyn Probe>,
        sink: ResultSink,
        workers: usize,
    ) -> Self {
        Self {
            storage,
            probe,
            sink,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one full cycle and wait for every measurement to pass through the sink
    ///
    /// A failed snapshot aborts the cycle before anything is dispatched.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, cycle: u64) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let endpoints = self.storage.list_endpoints().await.map_err(|e| {
            error!("failed to load endpoints: {}", e);
            CycleError::Snapshot(e)
        })?;

        let mut report = CycleReport::new(cycle, endpoints.len(), started_at);
        if endpoints.is_empty() {
            debug!("no endpoints registered, nothing to check");
            report.duration = start.elapsed();
            return Ok(report);
        }

        let mut results = self.dispatch(endpoints);

        while report.received < report.dispatched {
            let Some(measurement) = results.recv().await else {
                error!(
                    "{} probes never reported back, finishing cycle early",
                    report.missing()
                );
                break;
            };

            report.received += 1;
            if measurement.is_down() {
                report.down += 1;
            }

            let outcome = self.sink.handle(&measurement).await;
            if outcome.persisted {
                report.persisted += 1;
            }
            if outcome.published {
                report.published += 1;
            }
        }

        report.duration = start.elapsed();
        info!(
            "cycle {} done: {} checked, {} down, {} persisted, {} published in {:?}",
            cycle,
            report.received,
            report.down,
            report.persisted,
            report.published,
            report.duration
        );

        Ok(report)
    }

    /// Start the worker pool; the returned receiver yields one measurement per endpoint
    fn dispatch(&self, endpoints: Vec<Endpoint>) -> mpsc::Receiver<Measurement> {
        let count = endpoints.len();
        let pool_size = self.workers.min(count);
        debug!("dispatching {count} probes to {pool_size} workers");

        let queue = Arc::new(Mutex::new(endpoints.into_iter()));
        let (result_tx, result_rx) = mpsc::channel(count);

        for worker in 0..pool_size {
            let queue = queue.clone();
            let probe = self.probe.clone();
            let result_tx = result_tx.clone();

            tokio::spawn(
                async move {
                    loop {
                        let Some(endpoint) = queue.lock().await.next() else {
                            break;
                        };

                        let measurement = probe.probe(&endpoint).await;
                        if result_tx.send(measurement).await.is_err() {
                            // aggregator gave up on this cycle
                            break;
                        }
                    }
                    trace!("worker {worker} drained");
                }
                .in_current_span(),
            );
        }

        result_rx
    }
}
