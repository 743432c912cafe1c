//! Alert emission for down measurements
//!
//! The notifier only depends on [`AlertSink`]. [`AlertManager`] is the production sink and
//! delivers to a Discord webhook or a generic JSON webhook.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::Measurement;
use crate::config::{Alert, Webhook};
use crate::discord::{DiscordManager, MessageBuilder, build_downtime_embed};

/// Deadline for one alert delivery
pub const ALERT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one downtime alert; an error means the alert did not go out
    async fn send_down_alert(&self, measurement: &Measurement) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct AlertManager {
    client: Client,
    alert: Alert,
    discord_manager: DiscordManager,
}

impl AlertManager {
    pub fn new(alert: Alert) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(ALERT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            discord_manager: DiscordManager::new(client.clone()),
            client,
            alert,
        })
    }

    fn format_down_message(measurement: &Measurement) -> String {
        match &measurement.url {
            Some(url) => format!(
                "🚨 **Site DOWN**: site `{}` ({}) answered with status {}",
                measurement.endpoint_id, url, measurement.status_code
            ),
            None => format!(
                "🚨 **Site DOWN**: site `{}` answered with status {}",
                measurement.endpoint_id, measurement.status_code
            ),
        }
    }

    #[instrument(skip(self, webhook, measurement))]
    async fn send_webhook_alert(
        &self,
        webhook: &Webhook,
        measurement: &Measurement,
    ) -> anyhow::Result<()> {
        let payload = json!({
            "message": Self::format_down_message(measurement),
            "site_id": measurement.endpoint_id,
            "url": measurement.url,
            "status": "down",
            "status_code": measurement.status_code,
            "response_time_ms": measurement.response_time_ms,
            "timestamp": measurement.checked_at.unwrap_or_else(Utc::now).to_rfc3339()
        });

        let response = self
            .client
            .post(&webhook.url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send webhook alert")?;

        if !response.status().is_success() {
            error!("Webhook alert failed with status: {}", response.status());
            bail!("webhook answered {}", response.status());
        }

        info!("Successfully sent webhook alert");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for AlertManager {
    #[instrument(skip(self, measurement), fields(endpoint_id = measurement.endpoint_id))]
    async fn send_down_alert(&self, measurement: &Measurement) -> anyhow::Result<()> {
        match &self.alert {
            Alert::Discord(discord) => {
                let mut message_builder =
                    MessageBuilder::new().add_embed(build_downtime_embed(measurement));
                if let Some(user_id) = &discord.user_id {
                    message_builder = message_builder.content(format!(
                        "🔴 Site `{}` is down <@{user_id}>",
                        measurement.endpoint_id
                    ));
                }

                self.discord_manager
                    .send_message(discord, &message_builder.build())
                    .await
            }
            Alert::Webhook(webhook) => self.send_webhook_alert(webhook, measurement).await,
        }
    }
}
