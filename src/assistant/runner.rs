//! Main message loop.
//!
//! Inbound messages are routed to a per-user lane: an unbounded queue with
//! one worker task, so a user's messages are handled one at a time in
//! arrival order while different users proceed in parallel. A worker that
//! sits idle for the session timeout exits; the next message spawns a new
//! one.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::error::Error;

use super::machine::Assistant;
use super::replier::{ChannelReplier, Replier};
use super::replies;

/// How often idle sessions are pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Idle time after which a lane worker exits and its session is pruned.
    pub session_idle_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout: Duration::from_secs(3600),
        }
    }
}

/// One user's queue and the worker draining it.
struct Lane {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    worker: JoinHandle<()>,
}

/// Routes messages from every channel to the assistant.
pub struct Runner {
    assistant: Arc<Assistant>,
    channels: Arc<ChannelManager>,
    config: RunnerConfig,
    lanes: HashMap<String, Lane>,
}

impl Runner {
    pub fn new(assistant: Assistant, channels: ChannelManager, config: RunnerConfig) -> Self {
        Self {
            assistant: Arc::new(assistant),
            channels: Arc::new(channels),
            config,
            lanes: HashMap::new(),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(mut self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;

        // Spawn session pruning task
        let sessions = Arc::clone(self.assistant.sessions());
        let idle_timeout = self.config.session_idle_timeout;
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                sessions.prune_stale(idle_timeout).await;
            }
        });

        tracing::info!(channels = ?self.channels.names(), "Smart Mail Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.dispatch(message);
        }

        // Cleanup
        pruning_handle.abort();
        self.drain().await;
        self.channels.shutdown_all().await?;
        Ok(())
    }

    /// Queue `message` on its user's lane, starting a worker if needed.
    fn dispatch(&mut self, message: IncomingMessage) {
        let key = message.session_key();

        let message = match self.lanes.get(&key) {
            Some(lane) => match lane.tx.send(message) {
                Ok(()) => return,
                // Worker exited on idle; start a fresh one below.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        self.lanes.retain(|_, lane| !lane.worker.is_finished());

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(lane_worker(
            key.clone(),
            rx,
            Arc::clone(&self.assistant),
            Arc::clone(&self.channels),
            self.config.session_idle_timeout,
        ));
        // A fresh receiver cannot be closed yet.
        let _ = tx.send(message);
        self.lanes.insert(key, Lane { tx, worker });
    }

    /// Close every lane and wait for queued turns to finish.
    async fn drain(&mut self) {
        let lanes: Vec<Lane> = self.lanes.drain().map(|(_, lane)| lane).collect();
        for lane in lanes {
            drop(lane.tx);
            if let Err(e) = lane.worker.await {
                tracing::warn!(error = %e, "Lane worker ended abnormally");
            }
        }
    }
}

/// Drain one user's queue. Exits when the queue closes or stays empty for
/// `idle_timeout`; anything queued in the meantime is still handled.
async fn lane_worker(
    key: String,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    assistant: Arc<Assistant>,
    channels: Arc<ChannelManager>,
    idle_timeout: Duration,
) {
    tracing::debug!(session = %key, "Lane worker started");

    loop {
        let message = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Some(message) = rx.recv().await {
                    run_turn(&key, message, &assistant, &channels).await;
                }
                break;
            }
        };
        run_turn(&key, message, &assistant, &channels).await;
    }

    tracing::debug!(session = %key, "Lane worker stopped");
}

/// Handle one message, containing any panic to this user's session.
async fn run_turn(
    key: &str,
    message: IncomingMessage,
    assistant: &Assistant,
    channels: &Arc<ChannelManager>,
) {
    let username = message.display_name().to_string();
    let text = message.content.clone();
    let replier = ChannelReplier::new(Arc::clone(channels), message);

    let turn = AssertUnwindSafe(assistant.handle(key, &username, &text, &replier));
    if turn.catch_unwind().await.is_err() {
        tracing::error!(session = key, "Turn panicked, resetting session");
        assistant.recover(key).await;
        replier.reply(replies::UNEXPECTED_ERROR).await;
    }
}
