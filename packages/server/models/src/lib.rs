#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the Nightwatch read API — §6.
//!
//! Kept separate from `nightwatch_database_models` so the wire contract
//! (camelCase JSON, a flattened `ApiIncident`) can evolve independently
//! of the storage row shapes.

use chrono::{DateTime, NaiveDate, Utc};
use nightwatch_database_models::{
    DedupStatus, GeoPoint, IncidentQuery, IncidentReportRow, IncidentRow, LocationResolution, ReviewQueueQuery,
    ReviewStatus, RollupQuery, WeeklyRollupRow,
};
use nightwatch_source_models::SourceType;
use nightwatch_taxonomy_models::IncidentCategory;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published incident as returned by `GET /incidents` and nested in
/// `GET /review-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    pub id: Uuid,
    pub incident_type: String,
    pub category: IncidentCategory,
    pub urgency_score: u8,
    pub longitude: f64,
    pub latitude: f64,
    pub location_resolution: LocationResolution,
    pub location_confidence: f64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub reported_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub report_count: u32,
    pub source_types: Vec<SourceType>,
    pub confidence_score: f64,
    pub review_status: ReviewStatus,
}

impl From<IncidentRow> for ApiIncident {
    fn from(row: IncidentRow) -> Self {
        Self {
            id: row.id,
            incident_type: row.incident_type,
            category: row.category,
            urgency_score: row.urgency_score,
            longitude: row.location.longitude,
            latitude: row.location.latitude,
            location_resolution: row.location_resolution,
            location_confidence: row.location_confidence,
            address: row.address,
            city: row.city,
            region: row.region,
            occurred_at: row.occurred_at,
            reported_at: row.reported_at,
            title: row.title,
            description: row.description,
            report_count: row.report_count,
            source_types: row.source_types,
            confidence_score: row.confidence_score,
            review_status: row.review_status,
        }
    }
}

/// One raw observation linked to an incident, as shown alongside it in
/// the review queue so an operator can see what fed the confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncidentReport {
    pub id: Uuid,
    pub source_id: Uuid,
    pub external_id: String,
    pub source_url: String,
    pub raw_text: String,
    pub extracted_incident_type: Option<String>,
    pub extracted_category: Option<IncidentCategory>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    pub extraction_confidence: Option<f64>,
    pub dedup_status: DedupStatus,
}

impl From<IncidentReportRow> for ApiIncidentReport {
    fn from(row: IncidentReportRow) -> Self {
        Self {
            id: row.id,
            source_id: row.source_id,
            external_id: row.external_id,
            source_url: row.source_url,
            raw_text: row.raw_text,
            extracted_incident_type: row.extracted_incident_type,
            extracted_category: row.extracted_category,
            occurred_at: row.occurred_at,
            ingested_at: row.ingested_at,
            extraction_confidence: row.extraction_confidence,
            dedup_status: row.dedup_status,
        }
    }
}

/// One `needs_review` incident plus the reports behind its confidence
/// score, as returned by `GET /review-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReviewQueueItem {
    pub incident: ApiIncident,
    pub reports: Vec<ApiIncidentReport>,
}

impl From<(IncidentRow, Vec<IncidentReportRow>)> for ApiReviewQueueItem {
    fn from((incident, reports): (IncidentRow, Vec<IncidentReportRow>)) -> Self {
        Self { incident: incident.into(), reports: reports.into_iter().map(Into::into).collect() }
    }
}

/// Query parameters for `GET /incidents`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQueryParams {
    pub region: Option<String>,
    pub category: Option<IncidentCategory>,
    pub city: Option<String>,
    pub min_urgency: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl From<IncidentQueryParams> for IncidentQuery {
    fn from(params: IncidentQueryParams) -> Self {
        Self {
            region: params.region,
            category: params.category,
            city: params.city,
            min_urgency: params.min_urgency,
            since: params.since,
            until: params.until,
        }
    }
}

/// Query parameters for `GET /review-queue`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueQueryParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<ReviewQueueQueryParams> for ReviewQueueQuery {
    fn from(params: ReviewQueueQueryParams) -> Self {
        let default = Self::default();
        Self { limit: params.limit.unwrap_or(default.limit), offset: params.offset.unwrap_or(default.offset) }
    }
}

/// The operator decision carried by `POST /review-queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// Request body for `POST /review-queue`.
///
/// Matches spec §6 exactly (`{ incident_id, action, notes? }`);
/// `reviewed_by` isn't part of the documented contract, so it defaults
/// rather than rejecting a spec-shaped body that omits it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReviewDecision {
    pub incident_id: Uuid,
    pub action: ReviewAction,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    /// Free-text operator context, per §6. Not persisted on the incident
    /// (there's no `notes` column in the data model) — logged alongside
    /// the decision for the operator-visible audit trail only.
    pub notes: Option<String>,
}

impl ApiReviewDecision {
    /// The reviewer attribution to record, falling back to a generic
    /// `"operator"` when the caller didn't supply one.
    #[must_use]
    pub fn reviewed_by(&self) -> &str {
        self.reviewed_by.as_deref().unwrap_or("operator")
    }
}

/// Query parameters for `GET /rollup`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupQueryParams {
    pub municipality: Option<String>,
    pub weeks: Option<u32>,
}

impl From<RollupQueryParams> for RollupQuery {
    fn from(params: RollupQueryParams) -> Self {
        Self { municipality: params.municipality, weeks: params.weeks.unwrap_or(8) }
    }
}

/// A single weekly rollup entry as returned by `GET /rollup`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRollupWeek {
    pub week_start: NaiveDate,
    pub municipality: Option<String>,
    pub incidents_by_category: std::collections::BTreeMap<IncidentCategory, u32>,
    pub news_by_category: std::collections::BTreeMap<IncidentCategory, u32>,
    pub incident_trend: i32,
    pub summary_text: String,
}

impl From<WeeklyRollupRow> for ApiRollupWeek {
    fn from(row: WeeklyRollupRow) -> Self {
        Self {
            week_start: row.week_start,
            municipality: row.municipality,
            incidents_by_category: row.incidents_by_category,
            news_by_category: row.news_by_category,
            incident_trend: row.incident_trend,
            summary_text: row.summary_text,
        }
    }
}

/// The full `GET /rollup` response: weekly history plus live counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRollupResponse {
    pub weeks: Vec<ApiRollupWeek>,
    pub last_24h: u32,
    pub last_7d: u32,
}

/// `GET /health` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::{ReviewAction, ReviewQueueQueryParams};
    use nightwatch_database_models::ReviewQueueQuery;

    #[test]
    fn review_queue_params_fall_back_to_the_row_defaults() {
        let params = ReviewQueueQueryParams { limit: None, offset: None };
        let query: ReviewQueueQuery = params.into();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn review_action_round_trips_through_snake_case_json() {
        let json = serde_json::to_string(&ReviewAction::Approve).unwrap();
        assert_eq!(json, "\"approve\"");
    }
}
