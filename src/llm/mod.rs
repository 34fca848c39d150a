//! LLM integration for Smart Mail Bot.
//!
//! Supports:
//! - **Gemini**: `generateContent` REST API with structured JSON output
//!
//! Callers depend on the `LlmProvider` trait only; `create_provider` picks
//! the concrete client from configuration.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
    /// Upper bound for one generation request.
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Gemini => {
            tracing::info!("Using Gemini (model: {})", config.model);
            Ok(Arc::new(GeminiProvider::new(
                config.api_key.clone(),
                config.model.clone(),
                config.base_url.clone(),
                config.timeout,
            )?))
        }
    }
}
