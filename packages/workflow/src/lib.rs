#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Confidence aggregation and the review-status state machine — §4.6.
//!
//! [`confidence::recompute`] is a pure function over the current linked-
//! report set; [`recompute_and_store`] is the thin read-modify-write
//! wrapper that runs it against the datastore. The override rule
//! (`approved`/`rejected` statuses are never overwritten by an automatic
//! recompute) is enforced inside `write_incident_derived_state`'s SQL, so
//! this crate never needs to read the current `review_status` to decide
//! whether to apply its proposal.

pub mod confidence;

pub use nightwatch_database_models::LinkedReportSummary;
use switchy_database::Database;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the confidence/workflow layer.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The underlying datastore call failed.
    #[error("database error: {0}")]
    Database(#[from] nightwatch_database::DbError),
}

/// Recomputes and writes back the derived state for `incident_id`: reads
/// the current linked (non-rejected) report set, applies the §4.6
/// formula, and writes `report_count`, `source_types`, `confidence_score`
/// and the proposed `review_status` (subject to the override rule) in a
/// single statement.
///
/// Must run inside the same transaction/advisory-lock scope as the
/// link/create that preceded it (§5); this function does not itself
/// acquire the lock since `link_report_to_incident` and
/// `create_incident_from_report` already do.
///
/// # Errors
///
/// Returns [`WorkflowError`] if either datastore call fails.
pub async fn recompute_and_store(db: &dyn Database, incident_id: Uuid) -> Result<confidence::DerivedState, WorkflowError> {
    let linked = nightwatch_database::queries::linked_report_summaries(db, incident_id).await?;
    let derived = confidence::recompute(&linked);

    nightwatch_database::queries::write_incident_derived_state(
        db,
        incident_id,
        derived.report_count,
        &derived.source_types,
        derived.confidence_score,
        derived.proposed_status,
    )
    .await?;

    Ok(derived)
}

/// Applies an operator `approve` action (§4.6, §6 `POST /review-queue`).
///
/// # Errors
///
/// Returns [`WorkflowError`] if the datastore call fails.
pub async fn approve(db: &dyn Database, incident_id: Uuid, reviewed_by: &str) -> Result<(), WorkflowError> {
    nightwatch_database::queries::approve_incident(db, incident_id, reviewed_by).await?;
    Ok(())
}

/// Applies an operator `reject` action, cascading to every currently
/// linked report's `dedup_status` (§4.6, §6 `POST /review-queue`).
///
/// # Errors
///
/// Returns [`WorkflowError`] if the datastore call fails.
pub async fn reject(db: &dyn Database, incident_id: Uuid, reviewed_by: &str) -> Result<(), WorkflowError> {
    nightwatch_database::queries::reject_incident(db, incident_id, reviewed_by).await?;
    Ok(())
}
