//! Telegram notification sink
//!
//! Sends messages via the Telegram Bot API. The tracker destination is the
//! chat id.

use super::NotificationSink;
use crate::config::TelegramSettings;
use crate::error::DeliveryError;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram notification sink
pub struct TelegramSink {
    /// Bot token
    bot_token: String,
    /// API base URL
    api_base: String,
    /// HTTP client
    client: reqwest::Client,
}

impl TelegramSink {
    /// Create a new Telegram sink
    pub fn new(settings: &TelegramSettings, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            bot_token: settings.bot_token.clone(),
            api_base: TELEGRAM_API_BASE.to_string(),
            client,
        })
    }

    /// Override the API base (self-hosted Bot API server)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait::async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "chat_id": destination,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.send_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!(
                "Telegram API error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}
