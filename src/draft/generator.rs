//! Draft generator: turns a description (and the previous draft) into an email via the LLM.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

use super::model::Draft;
use super::prompts::{DRAFT_SYSTEM_PROMPT, draft_prompt, draft_response_schema};

/// Produces email drafts.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    /// Draft an email from `description`, revising `previous` when given.
    async fn generate(
        &self,
        username: &str,
        description: &str,
        previous: Option<&Draft>,
    ) -> Result<Draft, GenerationError>;
}

/// Configuration for draft generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// LLM temperature for drafting.
    pub temperature: f32,
    /// Max tokens for the LLM response.
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// `DraftGenerator` backed by an `LlmProvider` with structured JSON output.
pub struct LlmDraftGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl LlmDraftGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl DraftGenerator for LlmDraftGenerator {
    async fn generate(
        &self,
        username: &str,
        description: &str,
        previous: Option<&Draft>,
    ) -> Result<Draft, GenerationError> {
        info!(
            username = username,
            revision = previous.is_some(),
            model = self.llm.model_name(),
            "Generating email draft"
        );
        debug!(description = description, "Draft description");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(DRAFT_SYSTEM_PROMPT),
            ChatMessage::user(draft_prompt(username, description, previous)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_response_schema(draft_response_schema());

        let response = self.llm.complete(request).await?;

        parse_draft(&response.content).inspect_err(|e| {
            warn!(error = %e, "Discarding unusable draft response");
        })
    }
}

/// The structured reply the model is asked for.
#[derive(Debug, Deserialize)]
struct StructuredEmail {
    subject: String,
    body: String,
}

/// Parse an LLM reply into a draft. Blank fields are rejected.
pub fn parse_draft(llm_response: &str) -> Result<Draft, GenerationError> {
    let json_str = extract_json_object(llm_response).ok_or_else(|| GenerationError::Malformed {
        reason: "no JSON object in response".into(),
    })?;

    let email: StructuredEmail =
        serde_json::from_str(json_str).map_err(|e| GenerationError::Malformed {
            reason: format!("invalid draft JSON: {e}"),
        })?;

    let subject = email.subject.trim();
    let body = email.body.trim();
    if subject.is_empty() || body.is_empty() {
        return Err(GenerationError::Malformed {
            reason: "draft has an empty subject or body".into(),
        });
    }

    Ok(Draft::new(subject, body))
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    // Outermost braces
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
