//! Single liveness check against one endpoint
//!
//! A probe never fails: connection errors, DNS failures and timeouts all turn into a
//! down [`Measurement`] with the sentinel status code. The elapsed time is measured up to
//! the point the outcome was observed, including for failures.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{instrument, trace, warn};

use crate::{Endpoint, Measurement};

/// Default per-request timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Probe: Send + Sync {
    /// Check one endpoint, exactly once
    async fn probe(&self, endpoint: &Endpoint) -> Measurement;
}

/// Probe issuing one HTTP GET with a fixed timeout
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    #[instrument(skip(self, endpoint), fields(endpoint_id = endpoint.id, url = %endpoint.url))]
    async fn probe(&self, endpoint: &Endpoint) -> Measurement {
        trace!("probing endpoint");

        let start = Instant::now();
        let result = self.client.get(&endpoint.url).send().await;
        let elapsed = start.elapsed().as_millis() as u64;

        let measurement = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                trace!("endpoint answered {status} in {elapsed}ms");
                Measurement::completed(endpoint.id, status, elapsed)
            }
            Err(e) => {
                warn!("probe failed after {elapsed}ms: {e}");
                Measurement::failed(endpoint.id, elapsed)
            }
        };

        measurement
            .with_url(endpoint.url.clone())
            .with_checked_at(Utc::now())
    }
}
