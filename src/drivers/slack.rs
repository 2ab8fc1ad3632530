//! A driver for sending notifications to a Slack incoming webhook.

use crate::config::DriverConfig;
use crate::core::{Driver, DriverError, NativePayload};
use crate::drivers::{classify_response, classify_send_error, http_client, require_url, RegistryError};
use crate::formatting::{SlackTextFormatter, TextFormatter};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

/// Posts a formatted message to a Slack webhook.
pub struct SlackDriver {
    webhook_url: String,
    channel: Option<String>,
    username: Option<String>,
    formatter: Box<dyn TextFormatter>,
    client: reqwest::Client,
}

impl SlackDriver {
    pub const TYPE: &'static str = "slack";

    /// Creates a driver from its configuration.
    ///
    /// Requires `webhook_url`; `channel`, `username` and `timeout_seconds`
    /// are optional.
    pub fn from_config(config: &DriverConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            webhook_url: require_url(Self::TYPE, config, "webhook_url")?,
            channel: config.get_str("channel").map(str::to_string),
            username: config.get_str("username").map(str::to_string),
            formatter: Box::new(SlackTextFormatter),
            client: http_client(Self::TYPE, config)?,
        })
    }

    fn build_message(&self, payload: &NativePayload) -> Value {
        let mut message = json!({ "text": self.formatter.format(payload) });
        if let Some(channel) = &self.channel {
            message["channel"] = json!(channel);
        }
        if let Some(username) = &self.username {
            message["username"] = json!(username);
        }
        message
    }
}

#[async_trait]
impl Driver for SlackDriver {
    fn name(&self) -> &str {
        Self::TYPE
    }

    /// Formats and sends a payload to the configured Slack webhook.
    #[instrument(skip_all, fields(what = %payload.what))]
    async fn notify(&self, payload: &NativePayload) -> Result<bool, DriverError> {
        let message = self.build_message(payload);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| classify_send_error("Slack", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let delivered = classify_response("Slack", status, &body)?;
        if delivered {
            info!("Successfully sent notification to Slack.");
        }
        Ok(delivered)
    }
}
