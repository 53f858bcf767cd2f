//! `OpenAI`-shaped chat-completion provider.
//!
//! Also serves any `OpenAI`-compatible endpoint (Ollama, vLLM,
//! llama.cpp, LM Studio) via a configurable base URL.

use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::ExtractionError;

/// `OpenAI`-compatible chat-completion provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new provider targeting `base_url` (e.g.
    /// `https://api.openai.com` or a local `OpenAI`-compatible server).
    #[must_use]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self { api_key, model, base_url, client: reqwest::Client::new() }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: [OpenAiMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ExtractionError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: [
                OpenAiMessage { role: "system", content: system_prompt },
                OpenAiMessage { role: "user", content: user_prompt },
            ],
            max_tokens: 1024,
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: OpenAiError = serde_json::from_str(&body)
                .unwrap_or_else(|_| OpenAiError { error: OpenAiErrorDetail { message: format!("HTTP {status}: {body}") } });
            return Err(ExtractionError::Provider { message: err.error.message });
        }

        let response: OpenAiResponse = serde_json::from_str(&body)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::Provider { message: "no completion choices in response".to_string() })
    }
}
