#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source adapters — §4.2.
//!
//! Each configured [`nightwatch_source_models::Source`] is fetched through
//! one [`SourceAdapter`] implementation, chosen by its
//! [`nightwatch_source_models::SourceType`]. Adapters return raw, unparsed
//! observations; turning those into structured incidents is
//! `nightwatch_extraction`'s job, not this crate's.

pub mod api;
pub mod audio;
pub mod config;
pub mod html;
pub mod progress;
pub mod retry;
pub mod rss;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nightwatch_source_models::{RawObservation, Source, SourceType};

/// Errors that can occur while fetching or parsing one source.
///
/// Per-item failures inside a batch (a single malformed feed entry, a
/// table row that doesn't parse) are logged and skipped, not raised as
/// `SourceError` — only whole-document/whole-request failures propagate.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (after retries).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The feed/API/HTML document could not be parsed as a whole.
    #[error("failed to parse document: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },

    /// The source-configuration document was malformed.
    #[error("invalid source configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error reading the source-configuration document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait every source adapter implements.
///
/// One adapter instance handles every [`Source`] of its
/// [`SourceType`]; adapter selection by type happens in the binary that
/// wires adapters to the scheduler, not in this trait.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The [`SourceType`] this adapter handles.
    fn source_type(&self) -> SourceType;

    /// Fetches new observations for `source`. `since`, when present, is
    /// a hint adapters may use to skip already-seen items (e.g. an RSS
    /// feed's published date); it is not a correctness guarantee —
    /// idempotent upsert on `(source_id, external_id)` is what actually
    /// prevents duplicate ingestion.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the whole fetch/parse fails. Item-level
    /// failures within a batch are logged and omitted from the result,
    /// not propagated.
    async fn fetch(&self, source: &Source, since: Option<DateTime<Utc>>) -> Result<Vec<RawObservation>, SourceError>;
}

/// Computes a stable per-item dedup key from parts that are stable
/// across re-fetches of the same logical item (a GUID, or a hash of
/// URL + headline/date when no GUID is available).
#[must_use]
pub fn stable_external_id(parts: &[&str]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::stable_external_id;

    #[test]
    fn stable_external_id_is_deterministic() {
        let a = stable_external_id(&["https://example.test/a", "Headline"]);
        let b = stable_external_id(&["https://example.test/a", "Headline"]);
        assert_eq!(a, b);
    }

    #[test]
    fn stable_external_id_differs_on_any_part_change() {
        let a = stable_external_id(&["https://example.test/a", "Headline"]);
        let b = stable_external_id(&["https://example.test/a", "Different headline"]);
        assert_ne!(a, b);
    }
}
