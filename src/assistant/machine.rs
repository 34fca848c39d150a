//! The conversation state machine.
//!
//! One call to [`Assistant::handle`] is one turn: the user's session is
//! locked for the whole turn, the message is parsed, and a single
//! exhaustive match over the current phase decides what happens.

use std::sync::Arc;

use crate::channels::StatusUpdate;
use crate::draft::{Draft, DraftGenerator};
use crate::error::{Error, SessionError};
use crate::mailer::{MailDispatcher, Recipients};
use crate::session::{Phase, SenderCredentials, Session, SessionStore};

use super::command::{Command, CommandParser};
use super::replier::Replier;
use super::replies;

/// Drives every user's setup → compose → revise → confirm → send workflow.
pub struct Assistant {
    sessions: Arc<SessionStore>,
    generator: Arc<dyn DraftGenerator>,
    dispatcher: Arc<dyn MailDispatcher>,
}

impl Assistant {
    pub fn new(generator: Arc<dyn DraftGenerator>, dispatcher: Arc<dyn MailDispatcher>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            generator,
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound message from the user behind `key`.
    ///
    /// Never fails: a turn that errors is logged, reported generically, and
    /// the session drops back to idle with its credentials intact.
    pub async fn handle(&self, key: &str, username: &str, text: &str, replier: &dyn Replier) {
        let mut session = self.sessions.lock(key).await;

        // Setup input may legitimately start with `/`.
        let command = match CommandParser::parse(text) {
            Command::Unknown if session.phase().takes_raw_input() => {
                Command::Text(text.to_string())
            }
            command => command,
        };
        tracing::debug!(
            session = key,
            phase = %session.phase_kind(),
            command = command.label(),
            "Handling message"
        );

        if let Err(e) = self.step(&mut session, username, command, replier).await {
            tracing::error!(session = key, error = %e, "Turn failed, resetting session");
            session.reset_to_idle();
            replier.reply(replies::UNEXPECTED_ERROR).await;
        }
    }

    /// Reset a session after a turn was aborted from outside (panic).
    pub async fn recover(&self, key: &str) {
        if let Some(session) = self.sessions.get(key).await {
            session.lock().await.reset_to_idle();
            tracing::warn!(session = key, "Session reset to idle after aborted turn");
        }
    }

    async fn step(
        &self,
        session: &mut Session,
        username: &str,
        command: Command,
        replier: &dyn Replier,
    ) -> Result<(), Error> {
        match command {
            Command::Help => replier.reply(&replies::help(username)).await,
            Command::Setup => {
                session.begin_setup();
                replier.reply(replies::SETUP_ADDRESS_PROMPT).await;
            }
            Command::Compose => {
                if session.credentials().is_none() {
                    replier.reply(replies::SETUP_REQUIRED).await;
                } else {
                    session.set_phase(Phase::AwaitingContent);
                    replier.reply(&replies::compose_prompt(username)).await;
                }
            }
            Command::Confirm => self.confirm(session, replier).await,
            Command::Unknown => replier.reply(replies::UNKNOWN_COMMAND).await,
            Command::Text(text) => self.free_text(session, username, &text, replier).await?,
        }
        Ok(())
    }

    async fn confirm(&self, session: &mut Session, replier: &dyn Replier) {
        let (phase, reply) = match session.take_phase() {
            Phase::AwaitingRevisionOrSend { draft } => (
                Phase::AwaitingRecipients { draft },
                replies::RECIPIENTS_PROMPT,
            ),
            phase @ Phase::AwaitingRecipients { .. } => {
                (phase, replies::ALREADY_AWAITING_RECIPIENTS)
            }
            phase @ (Phase::Idle
            | Phase::AwaitingSetupAddress
            | Phase::AwaitingSetupSecret { .. }
            | Phase::AwaitingContent) => (phase, replies::NOTHING_TO_CONFIRM),
        };
        session.set_phase(phase);
        replier.reply(reply).await;
    }

    async fn free_text(
        &self,
        session: &mut Session,
        username: &str,
        text: &str,
        replier: &dyn Replier,
    ) -> Result<(), Error> {
        match session.take_phase() {
            Phase::Idle => {
                session.set_phase(Phase::Idle);
                replier.reply(replies::FALLBACK).await;
            }
            Phase::AwaitingSetupAddress => {
                let address = text.trim();
                if address.is_empty() {
                    session.set_phase(Phase::AwaitingSetupAddress);
                    replier.reply(replies::BLANK_ADDRESS).await;
                } else {
                    session.set_phase(Phase::AwaitingSetupSecret {
                        address: address.to_string(),
                    });
                    replier.reply(&replies::secret_prompt(address)).await;
                }
            }
            Phase::AwaitingSetupSecret { address } => {
                // Stored as typed: surrounding spaces may be part of it.
                let secret = text;
                if secret.trim().is_empty() {
                    session.set_phase(Phase::AwaitingSetupSecret { address });
                    replier.reply(replies::BLANK_SECRET).await;
                } else {
                    replier.conceal_input().await;
                    let reply = replies::setup_complete(&address);
                    session.complete_setup(SenderCredentials::new(address, secret));
                    tracing::info!(session = session.key(), "Sender setup complete");
                    replier.reply(&reply).await;
                }
            }
            Phase::AwaitingContent => {
                if text.trim().is_empty() {
                    session.set_phase(Phase::AwaitingContent);
                    replier.reply(replies::BLANK_DESCRIPTION).await;
                    return Ok(());
                }
                match self.generate(session, username, text, None, replier).await {
                    Some(draft) => {
                        let reply = replies::draft_ready(&draft);
                        session.set_phase(Phase::AwaitingRevisionOrSend { draft });
                        replier.reply(&reply).await;
                    }
                    None => {
                        session.set_phase(Phase::AwaitingContent);
                        replier.reply(replies::GENERATION_FAILED).await;
                    }
                }
            }
            Phase::AwaitingRevisionOrSend { draft } => {
                if text.trim().is_empty() {
                    session.set_phase(Phase::AwaitingRevisionOrSend { draft });
                    replier.reply(replies::BLANK_DESCRIPTION).await;
                    return Ok(());
                }
                match self
                    .generate(session, username, text, Some(&draft), replier)
                    .await
                {
                    Some(revised) => {
                        let reply = replies::draft_revised(&revised);
                        session.set_phase(Phase::AwaitingRevisionOrSend { draft: revised });
                        replier.reply(&reply).await;
                    }
                    None => {
                        session.set_phase(Phase::AwaitingRevisionOrSend { draft });
                        replier.reply(replies::REVISION_FAILED).await;
                    }
                }
            }
            Phase::AwaitingRecipients { draft } => {
                let Some(recipients) = Recipients::parse(text) else {
                    session.set_phase(Phase::AwaitingRecipients { draft });
                    replier.reply(replies::NO_RECIPIENTS).await;
                    return Ok(());
                };
                // The phase is already idle: whatever happens next, the draft is spent.
                self.dispatch(session, &recipients, &draft, replier).await?;
            }
        }
        Ok(())
    }

    async fn generate(
        &self,
        session: &Session,
        username: &str,
        description: &str,
        previous: Option<&Draft>,
        replier: &dyn Replier,
    ) -> Option<Draft> {
        tracing::debug!(
            session = session.key(),
            revision = previous.is_some(),
            description,
            "Generating draft"
        );
        replier.reply(replies::GENERATING).await;
        replier
            .status(StatusUpdate::Thinking("Generating draft".into()))
            .await;

        match self.generator.generate(username, description, previous).await {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!(session = session.key(), error = %e, "Draft generation failed");
                None
            }
        }
    }

    async fn dispatch(
        &self,
        session: &Session,
        recipients: &Recipients,
        draft: &Draft,
        replier: &dyn Replier,
    ) -> Result<(), Error> {
        let credentials = session
            .credentials()
            .ok_or_else(|| SessionError::MissingCredentials {
                key: session.key().to_string(),
                phase: "awaiting_recipients".into(),
            })?;

        replier.reply(replies::SENDING).await;
        replier
            .status(StatusUpdate::Thinking("Sending email".into()))
            .await;

        match self.dispatcher.send(recipients, draft, credentials).await {
            Ok(()) => {
                tracing::info!(
                    session = session.key(),
                    recipients = recipients.len(),
                    "Email dispatched"
                );
                replier.reply(&replies::sent(recipients)).await;
            }
            Err(e) => {
                tracing::warn!(session = session.key(), error = %e, "Email dispatch failed");
                replier.reply(&replies::delivery_failed(&e)).await;
            }
        }
        Ok(())
    }
}
