//! Error types for Smart Mail Bot.

use std::time::Duration;

/// Failures that abort a turn or the message loop.
///
/// Collaborator failures (`GenerationError`, `DeliveryError`) are answered
/// inside the turn and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {name}")]
    UnknownChannel { name: String },

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Draft generation errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Draft request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Draft response was not a usable email: {reason}")]
    Malformed { reason: String },
}

/// Mail delivery errors, split by what the user can do about them.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Bad SMTP settings, unresolvable host, or an address that does not parse.
    #[error("Mail configuration problem: {reason}")]
    Configuration { reason: String },

    /// The SMTP server rejected the login or the message.
    #[error("Mail server rejected the message: {reason}")]
    Protocol { reason: String },

    /// Connection, TLS or timeout failure.
    #[error("Could not reach the mail server: {reason}")]
    Network { reason: String },
}

/// Broken session invariants.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {key} reached {phase} without sender credentials")]
    MissingCredentials { key: String, phase: String },
}
