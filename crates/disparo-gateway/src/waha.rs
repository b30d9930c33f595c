//! WAHA HTTP client.
//!
//! Messages go out as `POST {base}/api/sendText` with an `X-Api-Key` header.
//! Docs: <https://waha.devlike.pro/docs/how-to/send-messages/>

use async_trait::async_trait;
use disparo_core::config::GatewayConfig;
use disparo_core::error::DisparoError;
use disparo_core::traits::DeliveryGateway;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// How much of an error response body ends up in the error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// WAHA gateway over one session.
#[derive(Debug)]
pub struct WahaGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    session: &'a str,
    chat_id: String,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_preview: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    status: String,
}

impl WahaGateway {
    /// Build a client from config. Fails when the base URL or API key is
    /// missing, so a misconfigured run dies before touching the queue.
    pub fn new(config: GatewayConfig) -> Result<Self, DisparoError> {
        if config.base_url.trim().is_empty() {
            return Err(DisparoError::Config(
                "gateway.base_url is not set".to_string(),
            ));
        }
        if config.api_key.trim().is_empty() {
            return Err(DisparoError::Config(
                "gateway.api_key is not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| DisparoError::Gateway(format!("failed to build http client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    /// Endpoint under `/api`, tolerating a base URL that already ends in it.
    fn endpoint(&self, path: &str) -> String {
        if self.base_url.ends_with("/api") {
            format!("{}/{path}", self.base_url)
        } else {
            format!("{}/api/{path}", self.base_url)
        }
    }

    /// WhatsApp chat id for a dialable number: digits plus the `@c.us` suffix.
    fn chat_id(address: &str) -> String {
        format!("{address}@c.us")
    }

    async fn post_send_text(
        &self,
        address: &str,
        text: &str,
        link_preview: Option<bool>,
    ) -> Result<(), DisparoError> {
        let url = self.endpoint("sendText");
        let body = SendTextRequest {
            session: &self.config.session,
            chat_id: Self::chat_id(address),
            text,
            link_preview,
        };

        let resp = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DisparoError::Gateway(format!("sendText request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let snippet: String = detail.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(DisparoError::Gateway(format!(
                "sendText returned {status}: {snippet}"
            )));
        }

        debug!(chat_id = %body.chat_id, "waha sendText ok");
        Ok(())
    }
}

#[async_trait]
impl DeliveryGateway for WahaGateway {
    fn name(&self) -> &str {
        "waha"
    }

    async fn send_text(&self, address: &str, body: &str) -> Result<(), DisparoError> {
        self.post_send_text(address, body, None).await
    }

    async fn send_link(&self, address: &str, url_text: &str) -> Result<(), DisparoError> {
        self.post_send_text(address, url_text, Some(true)).await
    }

    /// Check that the configured session exists and is working.
    async fn verify(&self) -> Result<(), DisparoError> {
        let url = self.endpoint(&format!("sessions/{}", self.config.session));
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| DisparoError::Gateway(format!("session check failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DisparoError::Gateway(format!(
                "session '{}' check returned {status}",
                self.config.session
            )));
        }

        let session: SessionResponse = resp
            .json()
            .await
            .map_err(|e| DisparoError::Gateway(format!("session check parse failed: {e}")))?;

        if !session.status.eq_ignore_ascii_case("working") {
            return Err(DisparoError::Gateway(format!(
                "session '{}' is not working (status: {})",
                self.config.session, session.status
            )));
        }
        Ok(())
    }
}
