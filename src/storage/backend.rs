//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::MeasurementRow;
use crate::{Endpoint, Measurement};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: one backend instance is shared by the
/// registration API handlers and the result sink of every cycle.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Callers in the pipeline log failures and carry on;
/// nothing here is allowed to take the process down.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Register a new endpoint and return it with its assigned id and creation time
    async fn insert_endpoint(&self, url: &str) -> StorageResult<Endpoint>;

    /// Look up a single endpoint
    async fn get_endpoint(&self, id: i64) -> StorageResult<Option<Endpoint>>;

    /// Snapshot of all registered endpoints, newest first
    ///
    /// Read once at the start of every cycle.
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>>;

    /// Append one measurement to the endpoint's history
    ///
    /// The recording timestamp is assigned by the backend. This is an append, never an
    /// upsert: the same measurement recorded twice produces two rows.
    async fn record_measurement(&self, measurement: &Measurement) -> StorageResult<()>;

    /// The N most recent measurements for an endpoint, newest first
    async fn recent_measurements(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<MeasurementRow>>;

    /// Most recent measurement recorded for an endpoint
    ///
    /// "Is this endpoint down" is answered from here; no status is stored separately.
    async fn latest_measurement(&self, endpoint_id: i64) -> StorageResult<Option<MeasurementRow>> {
        Ok(self
            .recent_measurements(endpoint_id, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend is operational.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
