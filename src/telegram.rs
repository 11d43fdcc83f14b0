use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::config::Settings;

pub struct TelegramClient {
    client: reqwest::Client,
    base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub text: Option<String>,
    pub chat: Chat,
    pub from: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        // Request timeout must outlive the long poll itself.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.telegram_poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            client,
            base: settings.telegram_api_base.clone(),
            token: settings.telegram_bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base, self.token)
    }

    /// Long-poll for new updates past `offset`. Blocks server-side for up
    /// to `timeout_secs` when there is nothing to deliver.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let resp: ApiResponse<Vec<Update>> = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(anyhow!(
                "getUpdates failed: {}",
                resp.description.unwrap_or_else(|| "unknown".into())
            ));
        }
        Ok(resp.result.unwrap_or_default())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("sendMessage returned {status}: {body}"));
        }
        Ok(())
    }
}
