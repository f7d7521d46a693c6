//! Thin Telegram Bot API transport: long-poll `getUpdates` for inbound
//! messages, `sendMessage` for outbound ones. No retry logic here; the
//! core treats delivery as fire-and-forget.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use weatherbot_core::Delivery;

/// Long-poll window for `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Must exceed the long-poll window or every poll times out client-side.
const HTTP_TIMEOUT: Duration = Duration::from_secs(50);

#[derive(Debug)]
pub struct TelegramClient {
    base_url: String,
    http: Client,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self { base_url: format!("https://api.telegram.org/bot{token}"), http })
    }

    /// Poll for updates after `offset`. Blocks up to the poll window.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.updates_request(offset, POLL_TIMEOUT_SECS).await
    }

    /// Discard the backlog accumulated while the bot was down and return
    /// the offset to poll from. `offset = -1` collapses the queue to its
    /// last entry; a zero timeout keeps this from waiting on live traffic.
    pub async fn skip_pending(&self) -> Result<i64> {
        let pending = self.updates_request(-1, 0).await?;
        Ok(next_offset(&pending).unwrap_or(0))
    }

    async fn updates_request(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let url = format!("{}/getUpdates", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .send()
            .await
            .context("Failed to send getUpdates request to Telegram")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Telegram getUpdates failed with status {status}"));
        }

        let parsed: ApiResponse<Vec<Update>> =
            res.json().await.context("Failed to parse Telegram getUpdates JSON")?;
        if !parsed.ok {
            return Err(anyhow!("Telegram getUpdates returned ok=false"));
        }

        Ok(parsed.result.unwrap_or_default())
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_payload(json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        }))
        .await
    }

    /// Like `send_message`, but attaches the reply keyboard with the
    /// "send location" button. Used for the welcome message.
    pub async fn send_message_with_location_keyboard(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<()> {
        self.send_payload(json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "reply_markup": {
                "keyboard": [[{"text": "📍 Send location", "request_location": true}]],
                "resize_keyboard": true,
            },
        }))
        .await
    }

    async fn send_payload(&self, payload: serde_json::Value) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let res = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send sendMessage request to Telegram")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Telegram sendMessage failed with status {status}"));
        }

        Ok(())
    }
}

#[async_trait]
impl Delivery for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.send_message(chat_id, text).await
    }
}

/// Error responses carry no `result` field at all, so it stays optional
/// and is only read once `ok` has been checked.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
}

/// First offset strictly after every update in the batch, or `None` for
/// an empty batch.
pub fn next_offset(updates: &[Update]) -> Option<i64> {
    updates.iter().map(|u| u.update_id + 1).max()
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<SharedLocation>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SharedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_update_parses() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"chat": {"id": 7}, "text": "/search London"}}
            ]
        }"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(json).expect("parse");
        assert!(parsed.ok);
        let updates = parsed.result.expect("result");
        let msg = updates[0].message.as_ref().expect("message");
        assert_eq!(msg.chat.id, 7);
        assert_eq!(msg.text.as_deref(), Some("/search London"));
        assert!(msg.location.is_none());
    }

    #[test]
    fn error_response_without_result_parses() {
        // Failed API calls omit `result` entirely.
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(json).expect("parse");
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
    }

    #[test]
    fn location_update_parses() {
        let json = r#"{
            "update_id": 11,
            "message": {"chat": {"id": 7}, "location": {"latitude": 41.3, "longitude": 69.2}}
        }"#;
        let update: Update = serde_json::from_str(json).expect("parse");
        let loc = update.message.expect("message").location.expect("location");
        assert_eq!(loc.latitude, 41.3);
        assert_eq!(loc.longitude, 69.2);
    }

    #[test]
    fn non_message_update_is_tolerated() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 12}"#).expect("parse");
        assert!(update.message.is_none());
    }

    #[test]
    fn next_offset_skips_past_the_whole_batch() {
        let updates: Vec<Update> = serde_json::from_str(
            r#"[{"update_id": 10}, {"update_id": 12}, {"update_id": 11}]"#,
        )
        .expect("parse");
        assert_eq!(next_offset(&updates), Some(13));
        assert_eq!(next_offset(&[]), None);
    }
}
