use anyhow::{Context, bail};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::Measurement;
use crate::config::Discord;

/// Discord's "red" embed color
pub const ALERT_COLOR: u32 = 15158332;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            inline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Downtime embed for one down measurement
///
/// The probe time is used for "Checked At" when the message carries one, otherwise the
/// time the alert is built.
pub fn build_downtime_embed(measurement: &Measurement) -> Embed {
    let checked_at = measurement.checked_at.unwrap_or_else(Utc::now);

    let mut fields = vec![EmbedField::new("Site ID", measurement.endpoint_id)];
    if let Some(url) = &measurement.url {
        fields.push(EmbedField::new("URL", url));
    }
    fields.push(EmbedField::new("Status", "DOWN"));
    fields.push(EmbedField::new("HTTP Status Code", measurement.status_code));
    fields.push(EmbedField::new(
        "Checked At",
        checked_at.format("%a, %d %b %Y %H:%M:%S UTC"),
    ));

    Embed {
        title: Some("🚨 Website Downtime Alert 🚨".to_string()),
        description: None,
        color: Some(ALERT_COLOR),
        fields,
        footer: Some(EmbedFooter {
            text: format!("Response time: {}ms", measurement.response_time_ms),
        }),
        timestamp: Some(checked_at.to_rfc3339()),
    }
}

#[derive(Debug, Clone)]
pub struct DiscordManager {
    client: Client,
}

impl DiscordManager {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Post a message to the webhook; anything but a 2xx answer is an error
    #[instrument(skip(self, discord, message))]
    pub async fn send_message(&self, discord: &Discord, message: &Message) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&discord.url)
            .json(message)
            .send()
            .await
            .context("Failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            error!("Discord message failed with status: {}", status);
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            bail!("Discord answered {status}");
        }

        info!("Successfully sent Discord message");
        Ok(())
    }
}
