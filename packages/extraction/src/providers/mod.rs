//! LLM provider abstraction.
//!
//! The extraction engine treats the LLM as a stateless function: one
//! system prompt, one user prompt, one text completion back — no
//! conversation state, no tool-use loop. [`LlmProvider`] is the seam
//! `nightwatch_extraction::LlmExtractor` calls through.

pub mod anthropic;
pub mod openai;

use crate::ExtractionError;

/// A single-shot chat-completion provider.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends one system/user prompt pair and returns the model's text
    /// completion verbatim (expected, but not guaranteed, to be a JSON
    /// object per the extraction prompt's instructions).
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if the request fails or the provider
    /// returns a non-success status.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ExtractionError>;
}

#[async_trait::async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ExtractionError> {
        (**self).complete(system_prompt, user_prompt).await
    }
}

/// Creates an LLM provider based on environment variables.
///
/// Checks `AI_PROVIDER` (default `"anthropic"`) and the corresponding
/// API key env var (`ANTHROPIC_API_KEY` or `OPENAI_API_KEY`). Setting
/// `AI_BASE_URL` points the OpenAI-shaped provider at any
/// OpenAI-compatible endpoint (Ollama, vLLM, llama.cpp, LM Studio, or a
/// hosted OpenAI-compatible gateway) instead of `api.openai.com`.
///
/// # Errors
///
/// Returns [`ExtractionError::Config`] if the required API key is not
/// set, or if `AI_PROVIDER` names an unsupported provider.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, ExtractionError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| ExtractionError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ExtractionError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            let base_url = std::env::var("AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
            Ok(Box::new(openai::OpenAiProvider::new(api_key, model, base_url)))
        }
        other => Err(ExtractionError::Config {
            message: format!("unknown AI provider: {other}. Use 'anthropic' or 'openai'."),
        }),
    }
}
