#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deduplicator / linker — §4.5.
//!
//! Given an extracted-and-geocoded report, finds a matching canonical
//! incident by space-time-type proximity and either links the report to
//! it or materializes a new canonical incident. Either branch ends with
//! a confidence recompute ([`nightwatch_workflow::recompute_and_store`])
//! so the report is never left linked without its incident's derived
//! state reflecting it (§5 atomicity requirement).

pub mod scoring;

use chrono::{DateTime, Utc};
use nightwatch_database_models::GeoPoint;
use nightwatch_taxonomy_models::IncidentCategory;
use switchy_database::Database;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the dedup/linker layer.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The underlying datastore call failed.
    #[error("database error: {0}")]
    Database(#[from] nightwatch_database::DbError),
    /// The confidence recompute step failed.
    #[error("workflow error: {0}")]
    Workflow(#[from] nightwatch_workflow::WorkflowError),
}

/// The outcome of a single report's dedup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The report was linked to an existing canonical incident.
    Linked { incident_id: Uuid },
    /// No candidate met the match threshold; a new canonical incident
    /// was created.
    NewIncident { incident_id: Uuid },
}

impl LinkOutcome {
    #[must_use]
    pub const fn incident_id(self) -> Uuid {
        match self {
            Self::Linked { incident_id } | Self::NewIncident { incident_id } => incident_id,
        }
    }
}

/// Everything the linker needs about one extracted-and-geocoded report,
/// already persisted as a pending [`nightwatch_database_models::IncidentReportRow`].
#[allow(clippy::too_many_arguments)]
pub struct LinkInput<'a> {
    pub report_id: Uuid,
    pub region: &'a str,
    pub incident_type: &'a str,
    pub category: IncidentCategory,
    pub urgency_score: u8,
    pub point: GeoPoint,
    pub location_resolution: nightwatch_database_models::LocationResolution,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    /// `occurred_at` when present, else `ingested_at` — the §9 Open
    /// Question resolution for missing datelines. Used only for the
    /// candidate-search time window and the score's Δt term; the
    /// persisted `occurred_at` on the incident stays whatever the
    /// extraction produced (possibly `None`).
    pub reference_time: DateTime<Utc>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub title: &'a str,
    pub description: Option<&'a str>,
}

/// Finds a matching canonical incident for `input` or creates a new one,
/// then recomputes the incident's derived confidence state.
///
/// # Errors
///
/// Returns [`DedupError`] if any datastore call or the confidence
/// recompute fails.
pub async fn link_or_create(db: &dyn Database, input: &LinkInput<'_>) -> Result<LinkOutcome, DedupError> {
    let candidates = nightwatch_database::queries::find_dedup_candidates(
        db,
        input.region,
        input.point,
        input.reference_time,
        input.incident_type,
        scoring::SEARCH_RADIUS_METERS,
        scoring::SEARCH_WINDOW_HOURS,
    )
    .await?;

    let outcome = if let Some(best) = scoring::best_candidate(&candidates).filter(|c| scoring::score(c) >= scoring::MATCH_THRESHOLD) {
        let incident_id = best.incident_id;
        nightwatch_database::queries::link_report_to_incident(db, input.report_id, incident_id).await?;
        LinkOutcome::Linked { incident_id }
    } else {
        let incident_id = nightwatch_database::queries::create_incident_from_report(
            db,
            input.report_id,
            input.incident_type,
            input.category,
            input.urgency_score,
            input.point,
            input.location_resolution,
            input.address,
            input.city,
            input.region,
            input.occurred_at,
            input.title,
            input.description,
        )
        .await?;
        LinkOutcome::NewIncident { incident_id }
    };

    nightwatch_workflow::recompute_and_store(db, outcome.incident_id()).await?;

    Ok(outcome)
}
