use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("bot backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bot backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid bot reply: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotButton {
    pub title: String,
    pub payload: String,
}

/// One entry of the bot backend's reply array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BotReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<BotButton>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

impl BotReply {
    /// Intent name when the backend reports one under `custom.intent`.
    pub fn intent(&self) -> Option<&str> {
        self.custom.as_ref()?.get("intent")?.as_str()
    }
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    sender: &'a str,
    message: &'a str,
}

/// Conversational backend the chat widget talks to.
#[async_trait]
pub trait BotBackend: Send + Sync {
    async fn send(&self, sender: &str, message: &str) -> Result<Vec<BotReply>>;
}

/// Client for a Rasa-style REST webhook channel.
pub struct RasaBotClient {
    client: Client,
    base_url: String,
}

impl RasaBotClient {
    pub const WEBHOOK_PATH: &'static str = "/webhooks/rest/webhook";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn webhook_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            Self::WEBHOOK_PATH
        )
    }
}

#[async_trait]
impl BotBackend for RasaBotClient {
    async fn send(&self, sender: &str, message: &str) -> Result<Vec<BotReply>> {
        let response = self
            .client
            .post(self.webhook_url())
            .json(&WebhookRequest { sender, message })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BotError::Status {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("bot replied to {} with {} bytes", sender, body.len());
        Ok(serde_json::from_str(&body)?)
    }
}
