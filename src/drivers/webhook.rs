//! A driver that posts the raw payload as JSON to an arbitrary HTTP endpoint.

use crate::config::DriverConfig;
use crate::core::{Driver, DriverError, NativePayload};
use crate::drivers::{classify_response, classify_send_error, http_client, require_url, RegistryError};
use async_trait::async_trait;
use tracing::{debug, instrument};

pub struct WebhookDriver {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookDriver {
    pub const TYPE: &'static str = "webhook";

    /// Requires `url`; `auth_token` (sent as a bearer token) and
    /// `timeout_seconds` are optional.
    pub fn from_config(config: &DriverConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            url: require_url(Self::TYPE, config, "url")?,
            auth_token: config.get_str("auth_token").map(str::to_string),
            client: http_client(Self::TYPE, config)?,
        })
    }
}

#[async_trait]
impl Driver for WebhookDriver {
    fn name(&self) -> &str {
        Self::TYPE
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn notify(&self, payload: &NativePayload) -> Result<bool, DriverError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error("Webhook", e))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, "Webhook responded");
        classify_response("Webhook", status, &body)
    }
}
