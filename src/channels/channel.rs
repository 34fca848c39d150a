//! The `Channel` trait and the message types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message received from a chat platform.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel that received it (`"telegram"`, `"cli"`).
    pub channel: String,
    /// Platform user identifier.
    pub user_id: String,
    /// Display name, when the platform provides one.
    pub user_name: Option<String>,
    pub content: String,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (chat id, message id, ...).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            received_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Session key: users are namespaced by channel.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.user_id)
    }

    /// Name to address the user by, falling back to their id.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// A reply sent back on the channel a message came from.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Progress signals that are not replies.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Work is in progress (typing indicator).
    Thinking(String),
    /// A short informational notice.
    Status(String),
}

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to `msg` on this channel.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Show a progress signal. Silent by default.
    async fn send_status(
        &self,
        _status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Remove a sensitive inbound message from the chat history, where the
    /// platform allows it. No-op by default.
    async fn conceal(&self, _msg: &IncomingMessage) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
