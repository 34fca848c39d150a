//! Telegram channel: long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API client behind the `Channel` trait
//! (MessageStream, respond, send_status, conceal).

use async_trait::async_trait;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Default Bot API endpoint.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Commands shown in Telegram's command menu.
const BOT_COMMANDS: [(&str, &str); 4] = [
    ("help", "How to use the bot"),
    ("setup", "Set your sender email and SMTP password"),
    ("compose", "Start writing a new email"),
    ("confirm", "Send the current draft"),
];

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self::with_api_base(bot_token, allowed_users, TELEGRAM_API_BASE)
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(bot_token: String, allowed_users: Vec<String>, api_base: &str) -> Self {
        Self {
            bot_token,
            allowed_users,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Send a text message, split to fit Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);

        for chunk in &chunks {
            self.send_message_chunk(chat_id, chunk).await?;
        }
        Ok(())
    }

    /// Send a single chunk as plain text. Drafts carry model output verbatim,
    /// so no `parse_mode` is set.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed ({status}): {err}"),
            });
        }

        Ok(())
    }

    /// Register the command menu. Failure only costs the menu.
    async fn register_commands(&self) {
        let commands: Vec<serde_json::Value> = BOT_COMMANDS
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();

        match self
            .client
            .post(self.api_url("setMyCommands"))
            .json(&serde_json::json!({ "commands": commands }))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("Telegram command menu registered");
            }
            Ok(resp) => tracing::warn!(status = ?resp.status(), "Telegram setMyCommands rejected"),
            Err(e) => tracing::warn!("Telegram setMyCommands failed: {e}"),
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        self.register_commands().await;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = chat_id(&msg.metadata)?;
        self.send_message(chat_id, &response.content).await
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        if let Some(chat_id) = metadata.get("chat_id").and_then(|v| v.as_str()) {
            match status {
                StatusUpdate::Thinking(_) => {
                    let _ = self
                        .client
                        .post(self.api_url("sendChatAction"))
                        .json(&serde_json::json!({
                            "chat_id": chat_id,
                            "action": "typing"
                        }))
                        .send()
                        .await;
                }
                StatusUpdate::Status(ref msg) if !msg.is_empty() => {
                    let _ = self.send_message(chat_id, &format!("ℹ️ {msg}")).await;
                }
                StatusUpdate::Status(_) => {}
            }
        }
        Ok(())
    }

    async fn conceal(&self, msg: &IncomingMessage) -> Result<(), ChannelError> {
        let chat_id = chat_id(&msg.metadata)?;
        let Some(message_id) = msg.metadata.get("message_id").and_then(|v| v.as_i64()) else {
            return Ok(());
        };

        let resp = self
            .client
            .post(self.api_url("deleteMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "message_id": message_id
            }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("deleteMessage returned {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn chat_id(metadata: &serde_json::Value) -> Result<&str, ChannelError> {
    metadata
        .get("chat_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChannelError::SendFailed {
            name: "telegram".into(),
            reason: "No chat_id in message metadata".into(),
        })
}

/// Turn one `getUpdates` entry into an `IncomingMessage`.
///
/// Returns `None` for non-text updates and for users outside the allowlist.
fn parse_update(update: &serde_json::Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(|u| u.as_str())
        .unwrap_or("unknown");
    let user_id_str = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());

    // Check allowlist against both username and numeric ID
    let mut identities = vec![username];
    if let Some(ref id) = user_id_str {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities.iter().copied()) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: \
             username={username}, user_id={}",
            user_id_str.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();
    let message_id = message.get("message_id").and_then(serde_json::Value::as_i64);
    let first_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(|n| n.as_str());

    let incoming = IncomingMessage::new(
        "telegram",
        user_id_str.as_deref().unwrap_or(username),
        text,
    )
    .with_metadata(serde_json::json!({
        "chat_id": chat_id,
        "message_id": message_id,
        "username": username,
    }))
    .with_user_name(first_name.unwrap_or(username));

    Some(incoming)
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Back off to a char boundary before looking for a split point
        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
