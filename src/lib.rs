pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod backoff;
pub mod config;
pub mod discord;
pub mod notifier;
pub mod probe;
pub mod queue;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel status code for a probe that never got a response.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// A registered endpoint, owned by the registration side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a single probe.
///
/// Field names on the wire are stable: producers and the notifier must agree on them.
/// `URL` and `CheckedAt` are optional so that four-field messages still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Measurement {
    #[serde(rename = "SiteID")]
    pub endpoint_id: i64,

    pub is_up: bool,

    pub status_code: u16,

    pub response_time_ms: u64,

    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Measurement {
    /// Measurement for a request that completed with `status_code`.
    pub fn completed(endpoint_id: i64, status_code: u16, response_time_ms: u64) -> Self {
        Self {
            endpoint_id,
            is_up: is_success_status(status_code),
            status_code,
            response_time_ms,
            url: None,
            checked_at: None,
        }
    }

    /// Measurement for a request that could not be completed.
    pub fn failed(endpoint_id: i64, response_time_ms: u64) -> Self {
        Self {
            endpoint_id,
            is_up: false,
            status_code: NO_RESPONSE_STATUS,
            response_time_ms,
            url: None,
            checked_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_checked_at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = Some(checked_at);
        self
    }

    pub fn is_down(&self) -> bool {
        !self.is_up
    }
}

/// Liveness rule: any 2xx status is up, everything else (including the sentinel) is down.
pub fn is_success_status(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}
