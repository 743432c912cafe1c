//! SchedulerActor - Triggers one cycle per interval
//!
//! ## Key Features
//!
//! 1. **Immediate first cycle** - The first tick fires on startup
//! 2. **Single slot** - At most one cycle runs at a time; ticks that land while a cycle
//!    is still running are skipped and counted, never queued
//! 3. **Broadcast pattern** - Publishes a CycleReport for every finished cycle
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ─► slot free? ─yes─► spawn CycleRunner::run_cycle ─► CycleReport ─► [subscribers]
//!     ↑              └─no──► skip (warn)
//!     └─── Commands (RunNow, GetStatus, Shutdown)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument, warn};

use super::cycle::CycleRunner;
use super::messages::{CycleError, CycleReport, SchedulerCommand, SchedulerStatus};

pub struct SchedulerActor {
    runner: Arc<CycleRunner>,

    interval_duration: Duration,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Broadcast sender for finished cycles
    report_tx: broadcast::Sender<CycleReport>,

    /// The running cycle, if any
    in_flight: Option<JoinHandle<()>>,

    cycles_started: u64,

    cycles_skipped: u64,
}

impl SchedulerActor {
    pub fn new(
        runner: CycleRunner,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        report_tx: broadcast::Sender<CycleReport>,
    ) -> Self {
        Self {
            runner: Arc::new(runner),
            interval_duration,
            command_rx,
            report_tx,
            in_flight: None,
            cycles_started: 0,
            cycles_skipped: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// This is the entry point for the actor. It runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    ///
    /// A cycle that is running when the loop ends is awaited before returning.
    #[instrument(skip(self), fields(interval = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stopped = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.cycle_running() {
                        self.cycles_skipped += 1;
                        warn!(
                            "previous cycle still running, skipping tick ({} skipped so far)",
                            self.cycles_skipped
                        );
                    } else {
                        self.start_cycle(None);
                    }
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        SchedulerCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            if self.cycle_running() {
                                let _ = respond_to.send(Err(CycleError::InProgress));
                            } else {
                                self.start_cycle(Some(respond_to));
                            }
                        }

                        SchedulerCommand::GetStatus { respond_to } => {
                            let in_flight = self.cycle_running();
                            let _ = respond_to.send(SchedulerStatus {
                                cycles_started: self.cycles_started,
                                cycles_skipped: self.cycles_skipped,
                                in_flight,
                            });
                        }

                        SchedulerCommand::Shutdown { respond_to } => {
                            debug!("received shutdown command");
                            stopped = Some(respond_to);
                            break;
                        }
                    }
                }
            }
        }

        if let Some(cycle) = self.in_flight.take() {
            debug!("waiting for the running cycle to finish");
            let _ = cycle.await;
        }

        debug!("scheduler actor stopped");
        if let Some(respond_to) = stopped {
            let _ = respond_to.send(());
        }
    }

    /// Whether the slot is occupied; frees it once the cycle has finished
    fn cycle_running(&mut self) -> bool {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|cycle| cycle.is_finished())
        {
            self.in_flight = None;
        }
        self.in_flight.is_some()
    }

    fn start_cycle(
        &mut self,
        respond_to: Option<oneshot::Sender<Result<CycleReport, CycleError>>>,
    ) {
        self.cycles_started += 1;
        let cycle = self.cycles_started;
        let runner = self.runner.clone();
        let report_tx = self.report_tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let result = runner.run_cycle(cycle).await;

            if let Ok(report) = &result {
                // no subscribers is fine
                let _ = report_tx.send(report.clone());
            }
            if let Some(respond_to) = respond_to {
                let _ = respond_to.send(result);
            }
        }));
    }
}

/// Handle for controlling a SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
    report_tx: broadcast::Sender<CycleReport>,
}

impl SchedulerHandle {
    /// Spawn the scheduler; the first cycle starts right away
    pub fn spawn(runner: CycleRunner, interval_duration: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (report_tx, _) = broadcast::channel(16);

        let actor = SchedulerActor::new(runner, interval_duration, cmd_rx, report_tx.clone());

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            report_tx,
        }
    }

    /// Receive a report for every cycle that finishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.report_tx.subscribe()
    }

    /// Run a cycle now and wait for its report
    ///
    /// Fails with [`CycleError::InProgress`] instead of waiting if a cycle is running.
    pub async fn run_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await?;

        Ok(rx.await??)
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetStatus { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    /// Stop scheduling and wait for a running cycle to finish
    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SchedulerCommand::Shutdown { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}
