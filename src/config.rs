//! Configuration types.
//!
//! Everything is read once at startup from the environment (and a `.env`
//! file if present), then handed to the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::mailer::SmtpConfig;

/// Default Gemini model used for drafting.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Usernames or numeric ids allowed to talk to the bot. `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub smtp: SmtpConfig,
    /// `None` disables the Telegram channel.
    pub telegram: Option<TelegramConfig>,
    /// Sessions untouched for this long are pruned.
    pub session_idle_timeout: Duration,
    /// Directory for the rolling log file. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load `.env` (if any) and build the config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// Blank values count as unset. All missing required keys are reported
    /// in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GEMINI_API_KEY");
        let smtp_host = get("SMTP_SERVER");

        let missing: Vec<String> = [("GEMINI_API_KEY", &api_key), ("SMTP_SERVER", &smtp_host)]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key.to_string())
            .collect();

        let (Some(api_key), Some(smtp_host)) = (api_key, smtp_host) else {
            return Err(ConfigError::MissingEnvVars(missing));
        };

        let smtp_port = parse_or(get("SMTP_PORT"), "SMTP_PORT", 587u16)?;
        let smtp_timeout_secs = parse_or(get("SMTP_TIMEOUT_SECS"), "SMTP_TIMEOUT_SECS", 10u64)?;
        let gemini_timeout_secs =
            parse_or(get("GEMINI_TIMEOUT_SECS"), "GEMINI_TIMEOUT_SECS", 60u64)?;
        let idle_secs = parse_or(
            get("SESSION_IDLE_TIMEOUT_SECS"),
            "SESSION_IDLE_TIMEOUT_SECS",
            3600u64,
        )?;

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|bot_token| TelegramConfig {
            bot_token,
            allowed_users: get("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        });

        Ok(Self {
            llm: LlmConfig {
                backend: LlmBackend::Gemini,
                api_key: SecretString::from(api_key),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout: Duration::from_secs(gemini_timeout_secs),
            },
            smtp: SmtpConfig {
                host: smtp_host,
                port: smtp_port,
                timeout: Duration::from_secs(smtp_timeout_secs),
            },
            telegram,
            session_idle_timeout: Duration::from_secs(idle_secs),
            log_dir: get("SMART_MAIL_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}
