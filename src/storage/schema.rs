//! Row types returned by storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored probe result
///
/// Rows are only ever appended; recording the same measurement twice yields two rows
/// with distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRow {
    /// Row id assigned by the backend
    pub id: i64,

    pub endpoint_id: i64,

    pub is_up: bool,

    pub status_code: u16,

    pub response_time_ms: u64,

    /// Recording time assigned by the backend (always UTC)
    pub checked_at: DateTime<Utc>,
}

/// Current status of an endpoint, derived from its most recent measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Up,
    Down,
    /// Never checked yet
    Unknown,
}

impl EndpointStatus {
    pub fn from_latest(latest: Option<&MeasurementRow>) -> Self {
        match latest {
            Some(row) if row.is_up => EndpointStatus::Up,
            Some(_) => EndpointStatus::Down,
            None => EndpointStatus::Unknown,
        }
    }
}
