//! Reply sink for one inbound message.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};

/// Where the state machine sends its output for the message being handled.
///
/// Delivery is best effort: failures are logged by the implementation and
/// never abort a turn.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, text: &str);

    /// Progress signal (typing indicator). Ignored by default.
    async fn status(&self, _status: StatusUpdate) {}

    /// Hide the message being handled from chat history. Ignored by default.
    async fn conceal_input(&self) {}
}

/// Replies on the channel the message arrived on.
pub struct ChannelReplier {
    channels: Arc<ChannelManager>,
    message: IncomingMessage,
}

impl ChannelReplier {
    pub fn new(channels: Arc<ChannelManager>, message: IncomingMessage) -> Self {
        Self { channels, message }
    }
}

#[async_trait]
impl Replier for ChannelReplier {
    async fn reply(&self, text: &str) {
        if let Err(e) = self
            .channels
            .respond(&self.message, OutgoingResponse::text(text))
            .await
        {
            tracing::warn!(channel = %self.message.channel, error = %e, "Failed to send reply");
        }
    }

    async fn status(&self, status: StatusUpdate) {
        let _ = self
            .channels
            .send_status(&self.message.channel, status, &self.message.metadata)
            .await;
    }

    async fn conceal_input(&self) {
        if let Err(e) = self.channels.conceal(&self.message).await {
            tracing::warn!(channel = %self.message.channel, error = %e, "Failed to delete sensitive message");
        }
    }
}
