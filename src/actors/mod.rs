//! Actor-based health-check pipeline
//!
//! Each actor runs as an independent async task communicating via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   SchedulerActor ── tick / RunNow ──► CycleRunner (one cycle at a time)
//!                                          │ snapshot endpoints
//!                                          ▼
//!                                   work queue of endpoints
//!                                   ┌──────┼──────┐
//!                                worker  worker  worker   (fixed pool, one probe each)
//!                                   └──────┼──────┘
//!                                          ▼ mpsc (fan-in, any order)
//!                                   ResultSink ──► StorageBackend (append)
//!                                              └─► Publisher ──► durable queue
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the scheduler has an mpsc command channel for control messages
//! 2. **Events**: finished cycles are published on a broadcast channel
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod cycle;
pub mod messages;
pub mod publisher;
pub mod scheduler;
pub mod sink;
