#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source configuration types and the raw/extracted observation formats
//! that flow between the scheduler, adapters, and the extraction engine.

use chrono::{DateTime, Utc};
use nightwatch_taxonomy_models::IncidentCategory;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The kind of origin a [`Source`] pulls from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    Html,
    Rss,
    Api,
    Audio,
    Manual,
}

/// The editorial category a [`Source`] declares for its content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceCategory {
    News,
    Crime,
    Fire,
    Permits,
    Business,
}

/// A configured data origin, as declared in the source-configuration
/// document and upserted into the `sources` table by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: uuid::Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    /// Opaque area tag shared by sources, incidents, and centerlines
    /// (e.g. `mchenry_county`).
    pub region: String,
    pub category: SourceCategory,
    pub municipality: Option<String>,
    /// Opaque per-adapter config (selectors, poll interval, etc).
    pub config: SourceRuntimeConfig,
    pub is_active: bool,
    pub reliability_score: f64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-adapter runtime knobs, stored as an opaque JSON blob on [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceRuntimeConfig {
    pub poll_interval_s: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single entry from the source-configuration document (`config/sources.toml`).
///
/// Entries with `enabled = false` are skipped entirely; on each scheduler
/// start, enabled entries are upserted into the `sources` table by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDefinition {
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    pub region: String,
    pub category: SourceCategory,
    pub municipality: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub config: SourceRuntimeConfig,
}

/// One unprocessed observation yielded by a source adapter.
///
/// `external_id` is the source-local dedup key: `guid || link ||
/// item-hash` for feed/API items, a stable hash of `(url,
/// headline-or-date)` for HTML pages, and a hash of the transcript
/// window for audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub external_id: String,
    pub source_url: String,
    pub raw_text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub produced_at: DateTime<Utc>,
}

/// The extraction engine's successful output: a candidate structured
/// incident with a strict schema and explicit nulls.
///
/// `category` is drawn from the closed [`IncidentCategory`] set; any
/// extractor output that does not fit it is a malformed extraction, not
/// a new category (see `ExtractionError::UnknownCategory`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extracted {
    pub incident_type: String,
    pub category: IncidentCategory,
    pub address: Option<String>,
    pub city: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub urgency_score: u8,
    pub title: String,
    pub description: Option<String>,
    pub extraction_confidence: f64,
    pub model_identifier: String,
}

#[cfg(test)]
mod tests {
    use super::{SourceCategory, SourceType};
    use std::str::FromStr;

    #[test]
    fn source_type_round_trips() {
        for variant in [SourceType::Html, SourceType::Rss, SourceType::Api, SourceType::Audio, SourceType::Manual] {
            assert_eq!(SourceType::from_str(&variant.to_string()).unwrap(), variant);
        }
    }

    #[test]
    fn source_category_serializes_snake_case() {
        let json = serde_json::to_string(&SourceCategory::Business).unwrap();
        assert_eq!(json, "\"business\"");
    }
}
