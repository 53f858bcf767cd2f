#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Extraction engine — §4.3.
//!
//! Turns one [`RawObservation`] into one [`Extracted`] candidate
//! incident via a single-shot structured-extraction call: no
//! conversation state, no tool-use loop, no memory across calls. The
//! LLM is treated as a stateless function — same request in, same
//! shape of response out, every time.

pub mod providers;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use nightwatch_source_models::{Extracted, RawObservation, SourceCategory};
use nightwatch_taxonomy_models::IncidentCategory;
use serde::Deserialize;
use thiserror::Error;

use providers::LlmProvider;

/// Bounds retries of a single extraction call when the model's output
/// fails to parse or validate. After this many retries the observation
/// is dropped (raw text retained in the error for operator review), per
/// §7's "don't retry forever on a persistently malformed source" rule.
pub const MAX_EXTRACTION_RETRIES: u32 = 2;

/// Errors from the extraction engine.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// HTTP request to the LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error (non-success HTTP status, empty response).
    #[error("provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error (missing API key, unknown provider).
    #[error("configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The model's output did not match the strict schema after
    /// [`MAX_EXTRACTION_RETRIES`] attempts.
    #[error("malformed extraction after {attempts} attempt(s): {message}")]
    Malformed {
        /// Description of what went wrong (parse error or validation failure).
        message: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The source text that failed to extract, retained for operator review.
        raw_text: String,
    },
}

/// Context supplied alongside a [`RawObservation`] to help the
/// extractor disambiguate jurisdiction and editorial intent — the
/// model never has to guess which municipality or region a bare
/// "100 block of Main St" belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionHints<'a> {
    pub source_name: &'a str,
    pub source_category: SourceCategory,
    pub region: &'a str,
    pub municipality: Option<&'a str>,
}

/// Trait implemented by anything that can turn a [`RawObservation`]
/// into an [`Extracted`] candidate incident.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if the provider call fails or the
    /// output cannot be coerced into a valid [`Extracted`] after
    /// [`MAX_EXTRACTION_RETRIES`] attempts.
    async fn extract(&self, raw: &RawObservation, hints: &ExtractionHints<'_>) -> Result<Extracted, ExtractionError>;
}

/// The strict JSON schema the extraction prompt asks the model for.
/// `category` and `occurred_at` are validated/parsed after
/// deserialization rather than during it, so a bad value produces a
/// retry instead of a silent `serde` default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtraction {
    incident_type: String,
    category: String,
    address: Option<String>,
    city: Option<String>,
    occurred_at: Option<String>,
    urgency_score: u8,
    title: String,
    description: Option<String>,
    extraction_confidence: f64,
}

fn parse_occurred_at(value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("occurredAt {s:?} is not RFC3339: {e}"))
        })
        .transpose()
}

fn validate(raw: RawExtraction, model_identifier: &str) -> Result<Extracted, String> {
    let category = IncidentCategory::from_str(&raw.category).map_err(|_| format!("unknown category {:?}", raw.category))?;

    if !(1..=10).contains(&raw.urgency_score) {
        return Err(format!("urgencyScore {} out of range 1..=10", raw.urgency_score));
    }

    if !(0.0..=1.0).contains(&raw.extraction_confidence) {
        return Err(format!("extractionConfidence {} out of range 0.0..=1.0", raw.extraction_confidence));
    }

    let occurred_at = parse_occurred_at(raw.occurred_at.as_deref())?;

    Ok(Extracted {
        incident_type: raw.incident_type,
        category,
        address: raw.address,
        city: raw.city,
        occurred_at,
        urgency_score: raw.urgency_score,
        title: raw.title,
        description: raw.description,
        extraction_confidence: raw.extraction_confidence,
        model_identifier: model_identifier.to_string(),
    })
}

/// Strips a leading/trailing markdown code fence, if present — models
/// asked for "a JSON object" reliably wrap it in ` ```json ... ``` `
/// often enough that stripping it is cheaper than re-prompting.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.strip_suffix("```").unwrap_or(rest).trim())
}

const SYSTEM_PROMPT: &str = r#"You are a structured-extraction function. Given one raw news/scanner/report \
excerpt, return a single JSON object with exactly these fields and no others:

{
  "incidentType": string,
  "category": one of "VIOLENT_CRIME" | "PROPERTY_CRIME" | "FIRE" | "MEDICAL" | "TRAFFIC" | "DRUGS" | "MISSING_PERSON" | "SUSPICIOUS" | "OTHER",
  "address": string or null,
  "city": string or null,
  "occurredAt": RFC3339 timestamp string or null,
  "urgencyScore": integer 1-10,
  "title": string,
  "description": string or null,
  "extractionConfidence": number 0.0-1.0
}

Use null, never an empty string, for any field you cannot determine. Return only the JSON object, no surrounding prose."#;

fn build_user_prompt(raw: &RawObservation, hints: &ExtractionHints<'_>) -> String {
    format!(
        "Source: {} ({} feed, region={}, municipality={})\n\nText:\n{}",
        hints.source_name,
        hints.source_category,
        hints.region,
        hints.municipality.unwrap_or("unknown"),
        raw.raw_text,
    )
}

/// The production [`Extractor`]: wraps one [`LlmProvider`] and retries
/// up to [`MAX_EXTRACTION_RETRIES`] times on a malformed response.
pub struct LlmExtractor<P> {
    provider: P,
    model_identifier: String,
}

impl<P: LlmProvider> LlmExtractor<P> {
    pub const fn new(provider: P, model_identifier: String) -> Self {
        Self { provider, model_identifier }
    }
}

#[async_trait::async_trait]
impl<P: LlmProvider> Extractor for LlmExtractor<P> {
    async fn extract(&self, raw: &RawObservation, hints: &ExtractionHints<'_>) -> Result<Extracted, ExtractionError> {
        let user_prompt = build_user_prompt(raw, hints);

        let mut last_error = String::new();

        for attempt in 0..=MAX_EXTRACTION_RETRIES {
            let completion = self.provider.complete(SYSTEM_PROMPT, &user_prompt).await?;
            let json_text = strip_code_fence(&completion);

            let outcome = serde_json::from_str::<RawExtraction>(json_text)
                .map_err(|e| e.to_string())
                .and_then(|raw_extraction| validate(raw_extraction, &self.model_identifier));

            match outcome {
                Ok(extracted) => return Ok(extracted),
                Err(message) => {
                    log::warn!("extraction attempt {}/{MAX_EXTRACTION_RETRIES} malformed: {message}", attempt + 1);
                    last_error = message;
                }
            }
        }

        Err(ExtractionError::Malformed {
            message: last_error,
            attempts: MAX_EXTRACTION_RETRIES + 1,
            raw_text: raw.raw_text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_code_fence, validate, RawExtraction};

    #[test]
    fn strip_code_fence_removes_json_fence() {
        let text = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_is_a_no_op_on_plain_json() {
        let text = "{\"a\":1}";
        assert_eq!(strip_code_fence(text), "{\"a\":1}");
    }

    fn sample_raw() -> RawExtraction {
        RawExtraction {
            incident_type: "burglary".to_string(),
            category: "PROPERTY_CRIME".to_string(),
            address: Some("100 block of Main St".to_string()),
            city: Some("Woodstock".to_string()),
            occurred_at: Some("2026-07-20T14:30:00Z".to_string()),
            urgency_score: 5,
            title: "Burglary reported on Main St".to_string(),
            description: None,
            extraction_confidence: 0.8,
        }
    }

    #[test]
    fn validate_accepts_a_well_formed_extraction() {
        let extracted = validate(sample_raw(), "claude-sonnet-4-20250514").unwrap();
        assert_eq!(extracted.urgency_score, 5);
        assert_eq!(extracted.model_identifier, "claude-sonnet-4-20250514");
    }

    #[test]
    fn validate_rejects_an_unknown_category() {
        let mut raw = sample_raw();
        raw.category = "ARSON".to_string();
        assert!(validate(raw, "m").is_err());
    }

    #[test]
    fn validate_rejects_an_out_of_range_urgency_score() {
        let mut raw = sample_raw();
        raw.urgency_score = 11;
        assert!(validate(raw, "m").is_err());
    }

    #[test]
    fn validate_rejects_a_non_rfc3339_timestamp() {
        let mut raw = sample_raw();
        raw.occurred_at = Some("not a timestamp".to_string());
        assert!(validate(raw, "m").is_err());
    }

    #[test]
    fn validate_accepts_a_null_occurred_at() {
        let mut raw = sample_raw();
        raw.occurred_at = None;
        let extracted = validate(raw, "m").unwrap();
        assert!(extracted.occurred_at.is_none());
    }
}
