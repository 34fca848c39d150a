//! ChannelManager: owns the active channels and routes traffic between them and the bot.

use futures::stream::{self, StreamExt};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Holds every configured channel.
#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Box<dyn Channel>) {
        tracing::debug!(channel = channel.name(), "Registered channel");
        self.channels.push(channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn get(&self, name: &str) -> Result<&dyn Channel, ChannelError> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
            .ok_or_else(|| ChannelError::UnknownChannel {
                name: name.to_string(),
            })
    }

    /// Start every channel and merge their inbound streams.
    ///
    /// A channel that fails to start is logged and skipped; it is an error
    /// only if none start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::new();
        for channel in &self.channels {
            match channel.start().await {
                Ok(stream) => {
                    tracing::info!(channel = channel.name(), "Channel started");
                    streams.push(stream);
                }
                Err(e) => tracing::error!(channel = channel.name(), error = %e, "Channel failed to start"),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".into(),
                reason: "no channel could be started".into(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Reply on the channel `msg` arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    pub async fn send_status(
        &self,
        channel: &str,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        self.get(channel)?.send_status(status, metadata).await
    }

    pub async fn conceal(&self, msg: &IncomingMessage) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.conceal(msg).await
    }

    /// Shut every channel down, returning the first failure.
    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        let mut first_err = None;
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), error = %e, "Channel shutdown failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
