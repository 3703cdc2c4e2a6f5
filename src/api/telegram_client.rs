//! Telegram Bot API client.
//!
//! Serves both as the remote command channel (getUpdates) and as the
//! notification sink (sendMessage) for a single configured chat.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::gateway::{CommandBatch, CommandChannel, CommandUpdate, NotificationSink};
use super::types::*;
use super::{GatewayError, GatewayResult};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Long-poll window handed to getUpdates, in seconds. Zero makes it a short
/// poll so an empty queue answers immediately instead of stalling the tick.
const POLL_TIMEOUT_SECS: u64 = 0;

pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> GatewayResult<Self> {
        Self::with_base_url(TELEGRAM_API_BASE, token, chat_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 5))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn unwrap_envelope<T>(response: reqwest::Response) -> GatewayResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TelegramResponse<T> = serde_json::from_str(&body)?;
        if !envelope.ok {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: envelope.description.unwrap_or(body),
            });
        }
        envelope
            .result
            .ok_or_else(|| GatewayError::Decode("telegram response without result".to_string()))
    }
}

/// Flatten raw updates into text commands, dropping non-text updates but
/// keeping their ids in the batch cursor.
pub fn to_command_batch(updates: Vec<TelegramUpdate>) -> CommandBatch {
    let last_update_id = updates.iter().map(|u| u.update_id).max();
    let mut out: Vec<CommandUpdate> = updates
        .into_iter()
        .filter_map(|u| {
            let message = u.message?;
            let text = message.text?;
            Some(CommandUpdate {
                update_id: u.update_id,
                chat_id: Some(message.chat.id),
                text,
            })
        })
        .collect();
    out.sort_by_key(|u| u.update_id);
    CommandBatch {
        updates: out,
        last_update_id,
    }
}

#[async_trait]
impl CommandChannel for TelegramClient {
    async fn poll_updates(&self, after: Option<i64>) -> GatewayResult<CommandBatch> {
        let params = GetUpdatesParams {
            offset: after.map(|id| id + 1),
            timeout: POLL_TIMEOUT_SECS,
        };

        let response = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&params)
            .send()
            .await?;

        let updates: Vec<TelegramUpdate> = Self::unwrap_envelope(response).await?;
        debug!(count = updates.len(), offset = ?params.offset, "Polled command updates");
        Ok(to_command_batch(updates))
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn notify(&self, text: &str) -> GatewayResult<()> {
        let body = SendMessageParams {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        let result: GatewayResult<serde_json::Value> = Self::unwrap_envelope(response).await;
        if let Err(e) = &result {
            warn!(error = %e, "Telegram sendMessage failed");
        }
        result.map(|_| ())
    }
}
