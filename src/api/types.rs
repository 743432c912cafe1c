//! Request and response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Endpoint;
use crate::storage::{EndpointStatus, MeasurementRow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSiteResponse {
    pub id: i64,
}

/// Most recent measurement of a site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastCheck {
    pub is_up: bool,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl From<MeasurementRow> for LastCheck {
    fn from(row: MeasurementRow) -> Self {
        Self {
            is_up: row.is_up,
            status_code: row.status_code,
            response_time_ms: row.response_time_ms,
            checked_at: row.checked_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatusResponse {
    pub site: Endpoint,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<LastCheck>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub storage: String,
    pub timestamp: String,
}
