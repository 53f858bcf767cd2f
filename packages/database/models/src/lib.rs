#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of the five durable entities as stored
//! in and retrieved from the `PostGIS` database. They are distinct from the
//! API response types in `nightwatch_server_models` and the raw/extracted
//! ingestion types in `nightwatch_source_models`.

use chrono::{DateTime, NaiveDate, Utc};
use nightwatch_source_models::SourceType;
use nightwatch_taxonomy_models::IncidentCategory;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A WGS84 point, stored as `geography(Point, 4326)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// How a location was obtained by the geocoder.
///
/// Ordered coarsest-confidence-last: `location_confidence` is a
/// non-increasing function of tier in this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationResolution {
    Parcel,
    Block,
    Centroid,
    Unknown,
}

impl LocationResolution {
    /// The fixed confidence associated with each tier.
    #[must_use]
    pub const fn confidence(self) -> f64 {
        match self {
            Self::Parcel => 0.95,
            Self::Block => 0.70,
            Self::Centroid => 0.30,
            Self::Unknown => 0.0,
        }
    }
}

/// `IncidentReport.dedup_status` — monotonic, never returns to `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DedupStatus {
    Pending,
    Matched,
    NewIncident,
    Rejected,
}

/// `Incident.review_status`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewStatus {
    AutoPublished,
    Unverified,
    NeedsReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    /// Whether a recompute is forbidden from overwriting this status
    /// (the override-preservation invariant).
    #[must_use]
    pub const fn is_human_override(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// `Incident.status` — lifecycle outside the confidence workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentStatus {
    Active,
    Resolved,
    Retracted,
}

/// A single raw observation row (`IncidentReport`).
///
/// Created by extraction; mutated only by the deduplicator to set
/// `incident_id`/`dedup_status`. Never merged or destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReportRow {
    pub id: Uuid,
    pub source_id: Uuid,
    pub external_id: String,
    pub source_url: String,
    pub raw_text: String,
    /// The extraction engine's output, if extraction succeeded.
    pub extracted_incident_type: Option<String>,
    pub extracted_category: Option<IncidentCategory>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    pub extraction_model: Option<String>,
    pub extraction_confidence: Option<f64>,
    pub dedup_status: DedupStatus,
    pub dedup_processed_at: Option<DateTime<Utc>>,
    pub incident_id: Option<Uuid>,
}

/// A canonical, deduplicated incident row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRow {
    pub id: Uuid,
    pub incident_type: String,
    pub category: IncidentCategory,
    pub urgency_score: u8,
    pub location: GeoPoint,
    pub location_resolution: LocationResolution,
    pub location_confidence: f64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub reported_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    /// Derived: count of linked reports.
    pub report_count: u32,
    /// Derived: distinct source types among linked reports.
    pub source_types: Vec<SourceType>,
    /// Derived: the §4.6 confidence aggregate.
    pub confidence_score: f64,
    pub review_status: ReviewStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cached street-centerline geometry used by the block geocoding tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreetCenterlineRow {
    pub id: Uuid,
    pub region: String,
    pub street_name: String,
    pub street_name_normalized: String,
    pub from_address: i32,
    pub to_address: i32,
    pub city: Option<String>,
    /// Line geometry as an ordered list of WGS84 points.
    pub geometry: Vec<GeoPoint>,
}

/// A weekly aggregate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRollupRow {
    pub id: Uuid,
    pub week_start: NaiveDate,
    /// `None` denotes region-wide.
    pub municipality: Option<String>,
    pub incidents_by_category: std::collections::BTreeMap<IncidentCategory, u32>,
    pub news_by_category: std::collections::BTreeMap<IncidentCategory, u32>,
    pub incident_trend: i32,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

/// Candidate search + filter parameters for `GET /incidents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQuery {
    pub region: Option<String>,
    pub category: Option<IncidentCategory>,
    pub city: Option<String>,
    pub min_urgency: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Parameters for `GET /review-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueQuery {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ReviewQueueQuery {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

/// Parameters for `GET /rollup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupQuery {
    pub municipality: Option<String>,
    pub weeks: u32,
}

/// A candidate incident returned by the deduplicator's spatiotemporal
/// search, carrying just enough to compute a match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupCandidate {
    pub incident_id: Uuid,
    pub distance_meters: f64,
    pub time_delta_minutes: f64,
    pub incident_type_matches: bool,
}

/// The per-link summary the confidence recompute needs: one row per
/// linked report, not the full report payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedReportSummary {
    pub extraction_confidence: f64,
    pub source_type: SourceType,
}

#[cfg(test)]
mod tests {
    use super::{DedupStatus, LocationResolution, ReviewStatus};

    #[test]
    fn resolution_confidence_is_non_increasing_in_tier_order() {
        let tiers = [
            LocationResolution::Parcel,
            LocationResolution::Block,
            LocationResolution::Centroid,
            LocationResolution::Unknown,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].confidence() >= pair[1].confidence());
        }
    }

    #[test]
    fn review_status_override_rule() {
        assert!(ReviewStatus::Approved.is_human_override());
        assert!(ReviewStatus::Rejected.is_human_override());
        assert!(!ReviewStatus::AutoPublished.is_human_override());
        assert!(!ReviewStatus::Unverified.is_human_override());
        assert!(!ReviewStatus::NeedsReview.is_human_override());
    }

    #[test]
    fn dedup_status_default_is_pending() {
        assert_eq!(DedupStatus::Pending.as_ref(), "pending");
    }
}
