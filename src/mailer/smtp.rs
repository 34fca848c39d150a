//! SMTP delivery via lettre.
//!
//! Port 465 uses implicit TLS, every other port STARTTLS. The blocking
//! lettre transport runs on the blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::draft::Draft;
use crate::error::DeliveryError;
use crate::session::SenderCredentials;

use super::{MailDispatcher, Recipients};

/// SMTP server settings shared by every user.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Connection and command timeout.
    pub timeout: Duration,
}

/// Sends drafts through the configured SMTP relay with each user's credentials.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn check_config(&self) -> Result<(), DeliveryError> {
        if self.config.host.trim().is_empty() || self.config.port == 0 {
            return Err(DeliveryError::Configuration {
                reason: "SMTP server or port is not set".into(),
            });
        }
        Ok(())
    }

    /// Make sure the SMTP host resolves before opening a connection.
    async fn resolve_host(&self) -> Result<(), DeliveryError> {
        let host = self.config.host.as_str();
        let mut addrs = tokio::net::lookup_host((host, self.config.port))
            .await
            .map_err(|e| DeliveryError::Configuration {
                reason: format!("SMTP server '{host}' is not a valid hostname or IP address: {e}"),
            })?;

        if addrs.next().is_none() {
            return Err(DeliveryError::Configuration {
                reason: format!("SMTP server '{host}' did not resolve to any address"),
            });
        }
        Ok(())
    }

    fn transport(&self, credentials: &SenderCredentials) -> Result<SmtpTransport, DeliveryError> {
        let builder = if self.config.port == 465 {
            SmtpTransport::relay(&self.config.host)
        } else {
            SmtpTransport::starttls_relay(&self.config.host)
        }
        .map_err(|e| DeliveryError::Configuration {
            reason: format!("SMTP relay error: {e}"),
        })?;

        let creds = Credentials::new(
            credentials.address().to_string(),
            credentials.secret().expose_secret().to_string(),
        );

        Ok(builder
            .port(self.config.port)
            .credentials(creds)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

/// Build the plain-text message: every recipient goes in `To`.
pub fn build_message(
    recipients: &Recipients,
    draft: &Draft,
    credentials: &SenderCredentials,
) -> Result<Message, DeliveryError> {
    let from: Mailbox = credentials
        .address()
        .parse()
        .map_err(|e| DeliveryError::Configuration {
            reason: format!("Invalid sender address '{}': {e}", credentials.address()),
        })?;

    let mut builder = Message::builder().from(from);
    for address in recipients.iter() {
        let to: Mailbox = address.parse().map_err(|e| DeliveryError::Configuration {
            reason: format!("Invalid recipient address '{address}': {e}"),
        })?;
        builder = builder.to(to);
    }

    builder
        .subject(draft.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(draft.body.clone())
        .map_err(|e| DeliveryError::Configuration {
            reason: format!("Failed to build email: {e}"),
        })
}

/// Sort a transport failure into the class the user can act on.
fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> DeliveryError {
    let reason = e.to_string();
    if e.is_timeout() {
        DeliveryError::Network { reason }
    } else if e.is_permanent() || e.is_transient() || e.is_response() || e.is_client() {
        DeliveryError::Protocol { reason }
    } else {
        DeliveryError::Network { reason }
    }
}

#[async_trait]
impl MailDispatcher for SmtpDispatcher {
    async fn send(
        &self,
        recipients: &Recipients,
        draft: &Draft,
        credentials: &SenderCredentials,
    ) -> Result<(), DeliveryError> {
        self.check_config()?;
        let message = build_message(recipients, draft, credentials)?;
        self.resolve_host().await?;
        let transport = self.transport(credentials)?;

        let result = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DeliveryError::Network {
                reason: format!("SMTP send task failed: {e}"),
            })?;

        match result {
            Ok(response) => {
                tracing::info!(
                    recipients = recipients.len(),
                    code = %response.code(),
                    "Email sent"
                );
                Ok(())
            }
            Err(e) => {
                let err = classify_smtp_error(&e);
                tracing::warn!(error = %e, "SMTP send failed");
                Err(err)
            }
        }
    }
}
