#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library backing the `nightwatch_cli` binary: wires one [`RawObservation`]
//! through extraction, geocoding, and deduplication (§2's data flow), and
//! adapts that pipeline into a [`CycleHandler`] the scheduler can drive.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nightwatch_database_models::GeoPoint;
use nightwatch_extraction::{ExtractionError, ExtractionHints, Extractor};
use nightwatch_scheduler::CycleHandler;
use nightwatch_source::progress::ProgressCallback;
use nightwatch_source::{SourceAdapter, SourceError};
use nightwatch_source_models::{RawObservation, Source, SourceType};
use switchy_database::Database;
use thiserror::Error;

/// Errors from processing a single source's fetch-to-link pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source adapter error: {0}")]
    Source(#[from] SourceError),
    #[error("database error: {0}")]
    Database(#[from] nightwatch_database::DbError),
    #[error("geocode error: {0}")]
    Geocode(#[from] nightwatch_geocoding::GeocodeError),
    #[error("dedup error: {0}")]
    Dedup(#[from] nightwatch_dedup::DedupError),
}

/// Reads the two-letter state abbreviation a source's parcel-tier lookups
/// should use, from `config.extra.state`, falling back to the source's
/// opaque `region` tag when unset.
fn state_hint(source: &Source) -> String {
    source
        .config
        .extra
        .get("state")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| source.region.clone(), ToString::to_string)
}

/// Builds the parcel → block → centroid tier cascade for one source.
fn build_tiers<'db>(db: &'db dyn Database, source: &Source) -> Vec<Box<dyn nightwatch_geocoding::GeocodeTier + 'db>> {
    vec![
        Box::new(nightwatch_geocoding::parcel::ParcelTier::new(reqwest::Client::new(), state_hint(source))),
        Box::new(nightwatch_geocoding::block::BlockTier::new(db)),
        Box::new(nightwatch_geocoding::centroid::CentroidTier::new(db)),
    ]
}

/// Runs one [`RawObservation`] through insert → extract → geocode →
/// dedup/link, per the §2 data flow. Returns `Ok(true)` if it became (or
/// was linked to) an incident, `Ok(false)` if it was dropped as malformed.
///
/// # Errors
///
/// Returns [`PipelineError`] if any step other than extraction itself
/// fails (a malformed extraction is handled, not propagated, per §7).
pub async fn process_observation(
    db: &dyn Database,
    source: &Source,
    raw: &RawObservation,
    extractor: &dyn Extractor,
) -> Result<bool, PipelineError> {
    let report_id =
        nightwatch_database::queries::insert_pending_report(db, source.id, &raw.external_id, &raw.source_url, &raw.raw_text)
            .await?;

    let hints = ExtractionHints {
        source_name: &source.name,
        source_category: source.category,
        region: &source.region,
        municipality: source.municipality.as_deref(),
    };

    let extracted = match extractor.extract(raw, &hints).await {
        Ok(extracted) => extracted,
        Err(ExtractionError::Malformed { message, attempts, raw_text: _ }) => {
            log::warn!(
                "category=malformed_extraction source={} report={report_id} attempts={attempts}: {message}",
                source.name
            );
            nightwatch_database::queries::reject_report(db, report_id).await?;
            return Ok(false);
        }
        Err(err) => {
            log::warn!("category=extraction_error source={} report={report_id}: {err}", source.name);
            nightwatch_database::queries::reject_report(db, report_id).await?;
            return Ok(false);
        }
    };

    let tiers = build_tiers(db, source);
    let geocoded =
        nightwatch_geocoding::geocode(&tiers, extracted.address.as_deref(), extracted.city.as_deref(), &source.region)
            .await?;

    // A geocode miss is still stored (§8 Scenario edge case), tagged
    // `unknown`/confidence 0 rather than fabricating a plausible point.
    let point = geocoded.point.unwrap_or(GeoPoint { longitude: 0.0, latitude: 0.0 });

    nightwatch_database::queries::record_extraction(
        db,
        report_id,
        &extracted.incident_type,
        extracted.category,
        extracted.address.as_deref(),
        extracted.city.as_deref(),
        Some(point),
        extracted.occurred_at,
        &extracted.model_identifier,
        extracted.extraction_confidence,
    )
    .await?;

    let reference_time = extracted.occurred_at.unwrap_or(raw.produced_at);

    nightwatch_dedup::link_or_create(
        db,
        &nightwatch_dedup::LinkInput {
            report_id,
            region: &source.region,
            incident_type: &extracted.incident_type,
            category: extracted.category,
            urgency_score: extracted.urgency_score,
            point,
            location_resolution: geocoded.resolution,
            address: extracted.address.as_deref(),
            city: extracted.city.as_deref(),
            reference_time,
            occurred_at: extracted.occurred_at,
            title: &extracted.title,
            description: extracted.description.as_deref(),
        },
    )
    .await?;

    Ok(true)
}

/// The [`CycleHandler`] the scheduler drives: fetches each due source
/// through its adapter, then runs every observation through
/// [`process_observation`].
pub struct IngestionHandler {
    db: Arc<dyn Database>,
    adapters: HashMap<SourceType, Box<dyn SourceAdapter>>,
    extractor: Arc<dyn Extractor>,
    /// Ticked once per source processed (success or failure). Defaults
    /// to [`nightwatch_source::progress::null_progress`] so callers that
    /// don't care about visual progress (tests, headless cron runs) pay
    /// nothing for it.
    progress: Arc<dyn ProgressCallback>,
}

impl IngestionHandler {
    /// Builds a handler with the standard RSS/API/HTML adapter set (audio
    /// sources are driven separately via `spawn_audio_worker`, never
    /// through this handler).
    #[must_use]
    pub fn new(db: Arc<dyn Database>, extractor: Arc<dyn Extractor>) -> Self {
        let mut adapters: HashMap<SourceType, Box<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(SourceType::Rss, Box::new(nightwatch_source::rss::RssAdapter));
        adapters.insert(SourceType::Api, Box::new(nightwatch_source::api::ApiAdapter));
        adapters.insert(SourceType::Html, Box::new(nightwatch_source::html::HtmlAdapter));
        Self { db, adapters, extractor, progress: nightwatch_source::progress::null_progress() }
    }

    /// Replaces the no-op progress sink with `progress`, ticked once per
    /// source as `run_cycle` dispatches it.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }
}

#[async_trait]
impl CycleHandler for IngestionHandler {
    async fn process_source(&self, source: &Source) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let adapter = self
            .adapters
            .get(&source.source_type)
            .ok_or_else(|| format!("no adapter registered for source_type={}", source.source_type))?;

        let raw_observations = adapter.fetch(source, source.last_fetched_at).await?;
        let mut ingested = 0usize;

        for raw in &raw_observations {
            match process_observation(self.db.as_ref(), source, raw, self.extractor.as_ref()).await {
                Ok(true) => ingested += 1,
                Ok(false) => {}
                Err(err) => log::error!("category=pipeline_error source={} external_id={}: {err}", source.name, raw.external_id),
            }
        }

        self.progress.inc(1);
        Ok(ingested)
    }
}
