//! Telegram Bot API notification channel.
//!
//! Sends plain text through `sendMessage`. Telegram rejects messages over
//! 4096 UTF-16 code units, so long responses go out as consecutive messages.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use webprompt_core::{Error, NotifyTarget, Result};

use crate::NotificationChannel;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const MAX_MESSAGE_UNITS: usize = 4096;

pub struct TelegramChannel {
    client: reqwest::Client,
    chat_id: String,
    token: String,
    api_base: String,
}

impl TelegramChannel {
    pub fn new(target: &NotifyTarget) -> Self {
        Self {
            client: reqwest::Client::new(),
            chat_id: target.chat_id.clone(),
            token: target.credential.clone(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point at a different Bot API host (self-hosted server, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn send_chunk(&self, text: &str) -> Result<()> {
        let body = json!({ "chat_id": self.chat_id, "text": text });

        // reqwest errors can embed the URL, which carries the token.
        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::Notification(format!("Telegram request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "Telegram returned HTTP {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, message: &str) -> Result<()> {
        let chunks = split_message(message, MAX_MESSAGE_UNITS);
        for chunk in &chunks {
            self.send_chunk(chunk).await?;
        }
        debug!(
            "Telegram notification sent to chat {} ({} message(s))",
            self.chat_id,
            chunks.len()
        );
        Ok(())
    }
}

/// Split `text` into pieces of at most `limit` UTF-16 code units (the unit
/// Telegram measures), breaking after the last newline in a window when
/// there is one.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.encode_utf16().count() > limit {
        let window_end = window_end(rest, limit);
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => window_end,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Byte length of the longest prefix of `text` within `limit` UTF-16 units.
/// Always covers at least one char so splitting makes progress.
fn window_end(text: &str, limit: usize) -> usize {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return if i == 0 { c.len_utf8() } else { i };
        }
    }
    text.len()
}
