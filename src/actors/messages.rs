//! Message types for actor communication

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::storage::StorageError;

/// Summary of one finished cycle
///
/// Published on the scheduler's broadcast channel and returned by `RunNow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Sequence number of the cycle since the scheduler started
    pub cycle: u64,

    /// Endpoints in the snapshot, i.e. probes dispatched
    pub dispatched: usize,

    /// Measurements that reached the aggregator
    pub received: usize,

    /// Measurements appended to storage
    pub persisted: usize,

    /// Measurements accepted by the broker
    pub published: usize,

    /// Measurements with liveness = false
    pub down: usize,

    pub started_at: DateTime<Utc>,

    pub duration: Duration,
}

impl CycleReport {
    pub fn new(cycle: u64, dispatched: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            dispatched,
            received: 0,
            persisted: 0,
            published: 0,
            down: 0,
            started_at,
            duration: Duration::ZERO,
        }
    }

    /// Probes that never reported back (only non-zero if a worker died)
    pub fn missing(&self) -> usize {
        self.dispatched.saturating_sub(self.received)
    }
}

/// Why a cycle did not run to completion
#[derive(Debug)]
pub enum CycleError {
    /// The endpoint snapshot could not be read; nothing was dispatched
    Snapshot(StorageError),

    /// Another cycle is still running
    InProgress,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Snapshot(err) => write!(f, "could not load endpoints: {}", err),
            CycleError::InProgress => write!(f, "a cycle is already in progress"),
        }
    }
}

impl std::error::Error for CycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CycleError::Snapshot(err) => Some(err),
            CycleError::InProgress => None,
        }
    }
}

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a cycle immediately (bypassing the interval timer)
    ///
    /// Answered with `CycleError::InProgress` if a cycle is already running.
    RunNow {
        respond_to: oneshot::Sender<Result<CycleReport, CycleError>>,
    },

    /// Get scheduler counters
    GetStatus {
        respond_to: oneshot::Sender<SchedulerStatus>,
    },

    /// Gracefully shut down the scheduler
    ///
    /// The actor waits for an in-flight cycle, then answers and exits.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Cycles started (timer ticks and RunNow)
    pub cycles_started: u64,

    /// Timer ticks skipped because the previous cycle was still running
    pub cycles_skipped: u64,

    /// Whether a cycle is running right now
    pub in_flight: bool,
}
