use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Notifier;
use crate::config::NotifyConfig;
use crate::error::{truncate_diag, DeliveryError};

/// Telegram Bot API `sendMessage` in HTML parse mode.
#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(cfg: &NotifyConfig, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            client: Client::new(),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        }
    }

    // Carries the token; never log it.
    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = rsp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiReply>(&body)
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_else(|| truncate_diag(&body, 200));
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
