//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the pipeline without a database file
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded history**: Measurements are never evicted

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use super::schema::MeasurementRow;
use crate::{Endpoint, Measurement};

#[derive(Default)]
struct Tables {
    endpoints: Vec<Endpoint>,
    measurements: Vec<MeasurementRow>,
    next_endpoint_id: i64,
    next_measurement_id: i64,
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded measurement, oldest first
    pub async fn measurements(&self) -> Vec<MeasurementRow> {
        self.tables.read().await.measurements.clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_endpoint(&self, url: &str) -> StorageResult<Endpoint> {
        let mut tables = self.tables.write().await;
        tables.next_endpoint_id += 1;

        let endpoint = Endpoint {
            id: tables.next_endpoint_id,
            url: url.to_string(),
            created_at: Utc::now(),
        };
        tables.endpoints.push(endpoint.clone());

        debug!("in-memory backend: registered endpoint {}", endpoint.id);
        Ok(endpoint)
    }

    async fn get_endpoint(&self, id: i64) -> StorageResult<Option<Endpoint>> {
        let tables = self.tables.read().await;
        Ok(tables.endpoints.iter().find(|e| e.id == id).cloned())
    }

    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let tables = self.tables.read().await;
        Ok(tables.endpoints.iter().rev().cloned().collect())
    }

    async fn record_measurement(&self, measurement: &Measurement) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.next_measurement_id += 1;

        let row = MeasurementRow {
            id: tables.next_measurement_id,
            endpoint_id: measurement.endpoint_id,
            is_up: measurement.is_up,
            status_code: measurement.status_code,
            response_time_ms: measurement.response_time_ms,
            checked_at: Utc::now(),
        };
        tables.measurements.push(row);
        Ok(())
    }

    async fn recent_measurements(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<MeasurementRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .measurements
            .iter()
            .rev()
            .filter(|row| row.endpoint_id == endpoint_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let tables = self.tables.read().await;
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "memory".to_string());
        metadata.insert("endpoints".to_string(), tables.endpoints.len().to_string());
        metadata.insert(
            "measurements".to_string(),
            tables.measurements.len().to_string(),
        );

        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage: operational".to_string(),
            metadata,
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
