//! Database query functions for the ingestion pipeline.
//!
//! Spatial queries use `query_raw_params()` with `PostGIS` functions.
//! Non-spatial queries use the typed `switchy_database` query builder where
//! convenient, and raw SQL everywhere a dynamic filter set is needed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use moosicbox_json_utils::database::ToValue as _;
use nightwatch_database_models::{
    DedupCandidate, DedupStatus, GeoPoint, IncidentQuery, IncidentReportRow, IncidentRow, IncidentStatus,
    LinkedReportSummary, LocationResolution, ReviewQueueQuery, ReviewStatus, RollupQuery, StreetCenterlineRow,
    WeeklyRollupRow,
};
use nightwatch_source_models::{Source, SourceCategory, SourceDefinition, SourceRuntimeConfig, SourceType};
use nightwatch_taxonomy_models::IncidentCategory;
use switchy_database::{Database, DatabaseValue};
use uuid::Uuid;

use crate::DbError;

fn to_uuid(row: &switchy_database::Row, column: &str) -> Result<Uuid, DbError> {
    let raw: String = row.to_value(column).map_err(|e| DbError::Conversion {
        message: format!("failed to read {column}: {e}"),
    })?;
    Uuid::parse_str(&raw).map_err(|e| DbError::Conversion {
        message: format!("invalid uuid in {column}: {e}"),
    })
}

fn parse_enum<T: FromStr>(raw: &str, column: &str) -> Result<T, DbError> {
    raw.parse().map_err(|_| DbError::Conversion {
        message: format!("unrecognized value {raw:?} in {column}"),
    })
}

/// Inserts or retrieves the ID for a configured [`Source`], upserting by
/// `url` as the source-configuration document directs.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_source(db: &dyn Database, def: &SourceDefinition) -> Result<Uuid, DbError> {
    let config_json = serde_json::to_value(&def.config).map_err(|e| DbError::Conversion {
        message: format!("failed to serialize source config: {e}"),
    })?;

    let rows = db
        .query_raw_params(
            "INSERT INTO sources (
                id, name, source_type, url, region, category, municipality,
                config, is_active, reliability_score, created_at
             ) VALUES (
                gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, true, 0.5, NOW()
             )
             ON CONFLICT (url) DO UPDATE SET
                 name = EXCLUDED.name,
                 source_type = EXCLUDED.source_type,
                 region = EXCLUDED.region,
                 category = EXCLUDED.category,
                 municipality = EXCLUDED.municipality,
                 config = EXCLUDED.config,
                 is_active = true
             RETURNING id",
            &[
                DatabaseValue::String(def.name.clone()),
                DatabaseValue::String(def.source_type.to_string()),
                DatabaseValue::String(def.url.clone()),
                DatabaseValue::String(def.region.clone()),
                DatabaseValue::String(def.category.to_string()),
                def.municipality.clone().map_or(DatabaseValue::Null, DatabaseValue::String),
                DatabaseValue::String(config_json.to_string()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "failed to get source id from upsert".to_string(),
    })?;

    to_uuid(row, "id")
}

/// Marks a source inactive after too many consecutive failures (§7 fatal
/// source error), or on operator request.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn deactivate_source(db: &dyn Database, source_id: Uuid) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE sources SET is_active = false WHERE id = $1",
        &[DatabaseValue::String(source_id.to_string())],
    )
    .await?;
    Ok(())
}

/// Records a successful fetch cycle for a source.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn touch_source_fetched(db: &dyn Database, source_id: Uuid) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE sources SET last_fetched_at = NOW() WHERE id = $1",
        &[DatabaseValue::String(source_id.to_string())],
    )
    .await?;
    Ok(())
}

/// Returns every active source, for scheduler cycle selection.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_active_sources(db: &dyn Database) -> Result<Vec<Source>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name, source_type, url, region, category, municipality,
                    config, is_active, reliability_score, last_fetched_at, created_at
             FROM sources WHERE is_active = true",
            &[],
        )
        .await?;

    rows.iter().map(row_to_source).collect()
}

fn row_to_source(row: &switchy_database::Row) -> Result<Source, DbError> {
    let source_type_raw: String = row.to_value("source_type").unwrap_or_default();
    let category_raw: String = row.to_value("category").unwrap_or_default();
    let config_raw: String = row.to_value("config").unwrap_or_else(|_| "{}".to_string());

    let config: SourceRuntimeConfig = serde_json::from_str(&config_raw).unwrap_or_default();

    let last_fetched_naive: Option<chrono::NaiveDateTime> = row.to_value("last_fetched_at").unwrap_or(None);
    let created_naive: chrono::NaiveDateTime = row.to_value("created_at").unwrap_or_default();

    Ok(Source {
        id: to_uuid(row, "id")?,
        name: row.to_value("name").unwrap_or_default(),
        source_type: parse_enum::<SourceType>(&source_type_raw, "source_type")?,
        url: row.to_value("url").unwrap_or_default(),
        region: row.to_value("region").unwrap_or_default(),
        category: parse_enum::<SourceCategory>(&category_raw, "category")?,
        municipality: row.to_value("municipality").unwrap_or(None),
        config,
        is_active: row.to_value("is_active").unwrap_or(true),
        reliability_score: row.to_value("reliability_score").unwrap_or(0.5),
        last_fetched_at: last_fetched_naive.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_naive, Utc),
    })
}

/// Inserts a raw observation as a pending [`IncidentReportRow`].
///
/// Idempotent on `(source_id, external_id)`: a conflicting insert returns
/// the id of the already-ingested row rather than erroring, satisfying the
/// datastore-conflict handling in §7.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_pending_report(
    db: &dyn Database,
    source_id: Uuid,
    external_id: &str,
    source_url: &str,
    raw_text: &str,
) -> Result<Uuid, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO incident_reports (
                id, source_id, external_id, source_url, raw_text, dedup_status, ingested_at
             ) VALUES (gen_random_uuid(), $1, $2, $3, $4, 'pending', NOW())
             ON CONFLICT (source_id, external_id) DO UPDATE SET source_id = EXCLUDED.source_id
             RETURNING id",
            &[
                DatabaseValue::String(source_id.to_string()),
                DatabaseValue::String(external_id.to_string()),
                DatabaseValue::String(source_url.to_string()),
                DatabaseValue::String(raw_text.to_string()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "failed to get report id from insert".to_string(),
    })?;

    to_uuid(row, "id")
}

/// Records a successful extraction against a pending report.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
#[allow(clippy::too_many_arguments)]
pub async fn record_extraction(
    db: &dyn Database,
    report_id: Uuid,
    incident_type: &str,
    category: IncidentCategory,
    address: Option<&str>,
    city: Option<&str>,
    location: Option<GeoPoint>,
    occurred_at: Option<DateTime<Utc>>,
    model_identifier: &str,
    extraction_confidence: f64,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE incident_reports SET
            extracted_incident_type = $2,
            extracted_category = $3,
            address = $4,
            city = $5,
            location = CASE WHEN $6::double precision IS NULL THEN NULL
                       ELSE ST_SetSRID(ST_MakePoint($6, $7), 4326)::geography END,
            occurred_at = $8,
            extraction_model = $9,
            extraction_confidence = $10
         WHERE id = $1",
        &[
            DatabaseValue::String(report_id.to_string()),
            DatabaseValue::String(incident_type.to_string()),
            DatabaseValue::String(category.to_string()),
            address.map_or(DatabaseValue::Null, |a| DatabaseValue::String(a.to_string())),
            city.map_or(DatabaseValue::Null, |c| DatabaseValue::String(c.to_string())),
            location.map_or(DatabaseValue::Null, |p| DatabaseValue::Real64(p.longitude)),
            location.map_or(DatabaseValue::Null, |p| DatabaseValue::Real64(p.latitude)),
            occurred_at.map_or(DatabaseValue::Null, |dt| DatabaseValue::DateTime(dt.naive_utc())),
            DatabaseValue::String(model_identifier.to_string()),
            DatabaseValue::Real64(extraction_confidence),
        ],
    )
    .await?;
    Ok(())
}

/// Drops a report whose extraction was malformed (§7), keeping the raw
/// text row but marking it rejected so it never enters the dedup pass.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn reject_report(db: &dyn Database, report_id: Uuid) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE incident_reports SET dedup_status = 'rejected', dedup_processed_at = NOW() WHERE id = $1",
        &[DatabaseValue::String(report_id.to_string())],
    )
    .await?;
    Ok(())
}

/// Finds candidate incidents within the dedup radius/time window, scored
/// just enough for the caller to apply the §4.5 match formula.
///
/// `reference_time` is `occurred_at` when present, else `ingested_at`
/// (the §9 open-question resolution for missing datelines).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn find_dedup_candidates(
    db: &dyn Database,
    region: &str,
    point: GeoPoint,
    reference_time: DateTime<Utc>,
    incident_type: &str,
    radius_meters: f64,
    window_hours: i64,
) -> Result<Vec<DedupCandidate>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id,
                    ST_Distance(location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS distance_meters,
                    EXTRACT(EPOCH FROM (occurred_at - $3::timestamp)) / 60.0 AS time_delta_minutes,
                    incident_type
             FROM incidents
             WHERE region = $4
               AND ST_DWithin(location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $5)
               AND occurred_at BETWEEN $3::timestamp - make_interval(hours => $6)
                                    AND $3::timestamp + make_interval(hours => $6)",
            &[
                DatabaseValue::Real64(point.longitude),
                DatabaseValue::Real64(point.latitude),
                DatabaseValue::DateTime(reference_time.naive_utc()),
                DatabaseValue::String(region.to_string()),
                DatabaseValue::Real64(radius_meters),
                DatabaseValue::Int64(window_hours),
            ],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let row_incident_type: String = row.to_value("incident_type").unwrap_or_default();
            Ok(DedupCandidate {
                incident_id: to_uuid(row, "id")?,
                distance_meters: row.to_value("distance_meters").unwrap_or(f64::MAX),
                time_delta_minutes: row.to_value("time_delta_minutes").unwrap_or(f64::MAX),
                incident_type_matches: row_incident_type == incident_type,
            })
        })
        .collect()
}

/// Links a report to an existing canonical incident.
///
/// Takes a `pg_advisory_xact_lock` on the incident id so the write
/// composes with `recompute_incident_confidence` into a single serialized
/// step (§5 concurrency model), as long as both calls run in the same
/// transaction-scoped connection.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn link_report_to_incident(db: &dyn Database, report_id: Uuid, incident_id: Uuid) -> Result<(), DbError> {
    db.exec_raw_params(
        "SELECT pg_advisory_xact_lock(hashtext($1::text))",
        &[DatabaseValue::String(incident_id.to_string())],
    )
    .await?;

    db.exec_raw_params(
        "UPDATE incident_reports
         SET incident_id = $2, dedup_status = 'matched', dedup_processed_at = NOW()
         WHERE id = $1",
        &[
            DatabaseValue::String(report_id.to_string()),
            DatabaseValue::String(incident_id.to_string()),
        ],
    )
    .await?;
    Ok(())
}

/// Materializes a new canonical incident from an unmatched report.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
#[allow(clippy::too_many_arguments)]
pub async fn create_incident_from_report(
    db: &dyn Database,
    report_id: Uuid,
    incident_type: &str,
    category: IncidentCategory,
    urgency_score: u8,
    point: GeoPoint,
    resolution: LocationResolution,
    address: Option<&str>,
    city: Option<&str>,
    region: &str,
    occurred_at: Option<DateTime<Utc>>,
    title: &str,
    description: Option<&str>,
) -> Result<Uuid, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO incidents (
                id, incident_type, category, urgency_score,
                location, location_resolution, location_confidence,
                address, city, region, occurred_at, reported_at,
                title, description,
                report_count, source_types, confidence_score,
                review_status, status, created_at, updated_at
             ) VALUES (
                gen_random_uuid(), $1, $2, $3,
                ST_SetSRID(ST_MakePoint($4, $5), 4326)::geography, $6, $7,
                $8, $9, $10, $11, NOW(),
                $12, $13,
                0, '{}', 0,
                'needs_review', 'active', NOW(), NOW()
             ) RETURNING id",
            &[
                DatabaseValue::String(incident_type.to_string()),
                DatabaseValue::String(category.to_string()),
                DatabaseValue::Int32(i32::from(urgency_score)),
                DatabaseValue::Real64(point.longitude),
                DatabaseValue::Real64(point.latitude),
                DatabaseValue::String(resolution.to_string()),
                DatabaseValue::Real64(resolution.confidence()),
                address.map_or(DatabaseValue::Null, |a| DatabaseValue::String(a.to_string())),
                city.map_or(DatabaseValue::Null, |c| DatabaseValue::String(c.to_string())),
                DatabaseValue::String(region.to_string()),
                occurred_at.map_or(DatabaseValue::Null, |dt| DatabaseValue::DateTime(dt.naive_utc())),
                DatabaseValue::String(title.to_string()),
                description.map_or(DatabaseValue::Null, |d| DatabaseValue::String(d.to_string())),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "failed to get incident id from insert".to_string(),
    })?;
    let incident_id = to_uuid(row, "id")?;

    db.exec_raw_params(
        "UPDATE incident_reports SET incident_id = $2, dedup_status = 'new_incident', dedup_processed_at = NOW()
         WHERE id = $1",
        &[
            DatabaseValue::String(report_id.to_string()),
            DatabaseValue::String(incident_id.to_string()),
        ],
    )
    .await?;

    Ok(incident_id)
}

/// Fetches the minimal per-report summary the confidence formula needs.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn linked_report_summaries(db: &dyn Database, incident_id: Uuid) -> Result<Vec<LinkedReportSummary>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT r.extraction_confidence, s.source_type
             FROM incident_reports r
             JOIN sources s ON s.id = r.source_id
             WHERE r.incident_id = $1 AND r.dedup_status <> 'rejected'",
            &[DatabaseValue::String(incident_id.to_string())],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let source_type_raw: String = row.to_value("source_type").unwrap_or_default();
            Ok(LinkedReportSummary {
                extraction_confidence: row.to_value("extraction_confidence").unwrap_or(0.0),
                source_type: parse_enum::<SourceType>(&source_type_raw, "source_type")?,
            })
        })
        .collect()
}

/// Writes back the derived fields and (subject to the override rule) the
/// proposed `review_status` for an incident.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn write_incident_derived_state(
    db: &dyn Database,
    incident_id: Uuid,
    report_count: u32,
    source_types: &[SourceType],
    confidence_score: f64,
    proposed_status: ReviewStatus,
) -> Result<(), DbError> {
    let source_types_sql = format!(
        "{{{}}}",
        source_types.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    );

    db.exec_raw_params(
        "UPDATE incidents SET
            report_count = $2,
            source_types = $3,
            confidence_score = $4,
            review_status = CASE WHEN review_status IN ('approved', 'rejected') THEN review_status ELSE $5 END,
            updated_at = NOW()
         WHERE id = $1",
        &[
            DatabaseValue::String(incident_id.to_string()),
            DatabaseValue::Int32(i32::try_from(report_count).unwrap_or(i32::MAX)),
            DatabaseValue::String(source_types_sql),
            DatabaseValue::Real64(confidence_score),
            DatabaseValue::String(proposed_status.to_string()),
        ],
    )
    .await?;
    Ok(())
}

/// Applies an operator `approve` action.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn approve_incident(db: &dyn Database, incident_id: Uuid, reviewed_by: &str) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE incidents SET review_status = 'approved', reviewed_at = NOW(), reviewed_by = $2 WHERE id = $1",
        &[
            DatabaseValue::String(incident_id.to_string()),
            DatabaseValue::String(reviewed_by.to_string()),
        ],
    )
    .await?;
    Ok(())
}

/// Applies an operator `reject` action, cascading to every currently
/// linked report per §4.6.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn reject_incident(db: &dyn Database, incident_id: Uuid, reviewed_by: &str) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE incidents SET review_status = 'rejected', reviewed_at = NOW(), reviewed_by = $2 WHERE id = $1",
        &[
            DatabaseValue::String(incident_id.to_string()),
            DatabaseValue::String(reviewed_by.to_string()),
        ],
    )
    .await?;

    db.exec_raw_params(
        "UPDATE incident_reports SET dedup_status = 'rejected', dedup_processed_at = NOW() WHERE incident_id = $1",
        &[DatabaseValue::String(incident_id.to_string())],
    )
    .await?;

    Ok(())
}

/// Queries publishable incidents for `GET /incidents`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
#[allow(clippy::too_many_lines)]
pub async fn query_incidents(db: &dyn Database, query: &IncidentQuery) -> Result<Vec<IncidentRow>, DbError> {
    let mut sql = String::from(
        "SELECT id, incident_type, category, urgency_score,
                ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude,
                location_resolution, location_confidence, address, city, region,
                occurred_at, reported_at, title, description,
                report_count, source_types, confidence_score,
                review_status, reviewed_at, reviewed_by, status, created_at, updated_at
         FROM incidents
         WHERE review_status IN ('auto_published', 'unverified', 'approved')",
    );

    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = 1u32;

    if let Some(region) = &query.region {
        write!(sql, " AND region = ${idx}").unwrap();
        params.push(DatabaseValue::String(region.clone()));
        idx += 1;
    }
    if let Some(category) = &query.category {
        write!(sql, " AND category = ${idx}").unwrap();
        params.push(DatabaseValue::String(category.to_string()));
        idx += 1;
    }
    if let Some(city) = &query.city {
        write!(sql, " AND city = ${idx}").unwrap();
        params.push(DatabaseValue::String(city.clone()));
        idx += 1;
    }
    if let Some(min_urgency) = query.min_urgency {
        write!(sql, " AND urgency_score >= ${idx}").unwrap();
        params.push(DatabaseValue::Int32(i32::from(min_urgency)));
        idx += 1;
    }
    if let Some(since) = &query.since {
        write!(sql, " AND occurred_at >= ${idx}").unwrap();
        params.push(DatabaseValue::DateTime(since.naive_utc()));
        idx += 1;
    }
    if let Some(until) = &query.until {
        write!(sql, " AND occurred_at <= ${idx}").unwrap();
        params.push(DatabaseValue::DateTime(until.naive_utc()));
    }

    sql.push_str(" ORDER BY occurred_at DESC NULLS LAST");

    let rows = db.query_raw_params(&sql, &params).await?;
    rows.iter().map(row_to_incident).collect()
}

/// Queries the human-in-the-loop review queue.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_review_queue(
    db: &dyn Database,
    query: &ReviewQueueQuery,
) -> Result<Vec<(IncidentRow, Vec<IncidentReportRow>)>, DbError> {
    let limit = query.limit.min(50);
    let rows = db
        .query_raw_params(
            "SELECT id, incident_type, category, urgency_score,
                    ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude,
                    location_resolution, location_confidence, address, city, region,
                    occurred_at, reported_at, title, description,
                    report_count, source_types, confidence_score,
                    review_status, reviewed_at, reviewed_by, status, created_at, updated_at
             FROM incidents
             WHERE review_status = 'needs_review'
             ORDER BY updated_at DESC
             LIMIT $1 OFFSET $2",
            &[DatabaseValue::Int64(i64::from(limit)), DatabaseValue::Int64(i64::from(query.offset))],
        )
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let incident = row_to_incident(row)?;
        let reports = linked_reports(db, incident.id).await?;
        out.push((incident, reports));
    }
    Ok(out)
}

async fn linked_reports(db: &dyn Database, incident_id: Uuid) -> Result<Vec<IncidentReportRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, source_id, external_id, source_url, raw_text,
                    extracted_incident_type, extracted_category, address, city,
                    ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude,
                    occurred_at, ingested_at, extraction_model, extraction_confidence,
                    dedup_status, dedup_processed_at, incident_id
             FROM incident_reports WHERE incident_id = $1 ORDER BY ingested_at ASC",
            &[DatabaseValue::String(incident_id.to_string())],
        )
        .await?;
    rows.iter().map(row_to_report).collect()
}

fn row_to_incident(row: &switchy_database::Row) -> Result<IncidentRow, DbError> {
    let category_raw: String = row.to_value("category").unwrap_or_default();
    let resolution_raw: String = row.to_value("location_resolution").unwrap_or_default();
    let review_status_raw: String = row.to_value("review_status").unwrap_or_default();
    let status_raw: String = row.to_value("status").unwrap_or_default();
    let source_types_raw: String = row.to_value("source_types").unwrap_or_else(|_| "{}".to_string());

    let source_types = source_types_raw
        .trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<SourceType>().ok())
        .collect();

    let occurred_naive: Option<chrono::NaiveDateTime> = row.to_value("occurred_at").unwrap_or(None);
    let reported_naive: chrono::NaiveDateTime = row.to_value("reported_at").unwrap_or_default();
    let reviewed_naive: Option<chrono::NaiveDateTime> = row.to_value("reviewed_at").unwrap_or(None);
    let created_naive: chrono::NaiveDateTime = row.to_value("created_at").unwrap_or_default();
    let updated_naive: chrono::NaiveDateTime = row.to_value("updated_at").unwrap_or_default();

    Ok(IncidentRow {
        id: to_uuid(row, "id")?,
        incident_type: row.to_value("incident_type").unwrap_or_default(),
        category: parse_enum::<IncidentCategory>(&category_raw, "category")?,
        urgency_score: u8::try_from(row.to_value::<i32>("urgency_score").unwrap_or(1)).unwrap_or(1),
        location: GeoPoint {
            longitude: row.to_value("longitude").unwrap_or(0.0),
            latitude: row.to_value("latitude").unwrap_or(0.0),
        },
        location_resolution: parse_enum::<LocationResolution>(&resolution_raw, "location_resolution")?,
        location_confidence: row.to_value("location_confidence").unwrap_or(0.0),
        address: row.to_value("address").unwrap_or(None),
        city: row.to_value("city").unwrap_or(None),
        region: row.to_value("region").unwrap_or_default(),
        occurred_at: occurred_naive.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        reported_at: DateTime::<Utc>::from_naive_utc_and_offset(reported_naive, Utc),
        title: row.to_value("title").unwrap_or_default(),
        description: row.to_value("description").unwrap_or(None),
        report_count: u32::try_from(row.to_value::<i32>("report_count").unwrap_or(0)).unwrap_or(0),
        source_types,
        confidence_score: row.to_value("confidence_score").unwrap_or(0.0),
        review_status: parse_enum::<ReviewStatus>(&review_status_raw, "review_status")?,
        reviewed_at: reviewed_naive.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        reviewed_by: row.to_value("reviewed_by").unwrap_or(None),
        status: parse_enum::<IncidentStatus>(&status_raw, "status")?,
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_naive, Utc),
        updated_at: DateTime::<Utc>::from_naive_utc_and_offset(updated_naive, Utc),
    })
}

fn row_to_report(row: &switchy_database::Row) -> Result<IncidentReportRow, DbError> {
    let dedup_status_raw: String = row.to_value("dedup_status").unwrap_or_default();
    let extracted_category_raw: Option<String> = row.to_value("extracted_category").unwrap_or(None);

    let longitude: Option<f64> = row.to_value("longitude").unwrap_or(None);
    let latitude: Option<f64> = row.to_value("latitude").unwrap_or(None);
    let location = match (longitude, latitude) {
        (Some(longitude), Some(latitude)) => Some(GeoPoint { longitude, latitude }),
        _ => None,
    };

    let occurred_naive: Option<chrono::NaiveDateTime> = row.to_value("occurred_at").unwrap_or(None);
    let ingested_naive: chrono::NaiveDateTime = row.to_value("ingested_at").unwrap_or_default();
    let processed_naive: Option<chrono::NaiveDateTime> = row.to_value("dedup_processed_at").unwrap_or(None);
    let incident_id_raw: Option<String> = row.to_value("incident_id").unwrap_or(None);

    Ok(IncidentReportRow {
        id: to_uuid(row, "id")?,
        source_id: to_uuid(row, "source_id")?,
        external_id: row.to_value("external_id").unwrap_or_default(),
        source_url: row.to_value("source_url").unwrap_or_default(),
        raw_text: row.to_value("raw_text").unwrap_or_default(),
        extracted_incident_type: row.to_value("extracted_incident_type").unwrap_or(None),
        extracted_category: extracted_category_raw
            .map(|raw| parse_enum::<IncidentCategory>(&raw, "extracted_category"))
            .transpose()?,
        address: row.to_value("address").unwrap_or(None),
        city: row.to_value("city").unwrap_or(None),
        location,
        occurred_at: occurred_naive.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        ingested_at: DateTime::<Utc>::from_naive_utc_and_offset(ingested_naive, Utc),
        extraction_model: row.to_value("extraction_model").unwrap_or(None),
        extraction_confidence: row.to_value("extraction_confidence").unwrap_or(None),
        dedup_status: parse_enum::<DedupStatus>(&dedup_status_raw, "dedup_status")?,
        dedup_processed_at: processed_naive.map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc)),
        incident_id: incident_id_raw.map(|raw| Uuid::parse_str(&raw)).transpose().map_err(|e| DbError::Conversion {
            message: format!("invalid incident_id: {e}"),
        })?,
    })
}

/// Finds centerlines in `region` whose normalized name matches
/// `street_normalized` and whose address range spans `block_number`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn find_centerlines_for_block(
    db: &dyn Database,
    region: &str,
    street_normalized: &str,
    block_number: i32,
) -> Result<Vec<StreetCenterlineRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, region, street_name, street_name_normalized, from_address, to_address, city,
                    ST_AsText(geometry::geometry) AS wkt
             FROM street_centerlines
             WHERE region = $1
               AND street_name_normalized LIKE '%' || $2 || '%'
               AND $3 BETWEEN LEAST(from_address, to_address) AND GREATEST(from_address, to_address)
             ORDER BY id",
            &[
                DatabaseValue::String(region.to_string()),
                DatabaseValue::String(street_normalized.to_string()),
                DatabaseValue::Int32(block_number),
            ],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let wkt: String = row.to_value("wkt").unwrap_or_default();
            Ok(StreetCenterlineRow {
                id: to_uuid(row, "id")?,
                region: row.to_value("region").unwrap_or_default(),
                street_name: row.to_value("street_name").unwrap_or_default(),
                street_name_normalized: row.to_value("street_name_normalized").unwrap_or_default(),
                from_address: row.to_value("from_address").unwrap_or(0),
                to_address: row.to_value("to_address").unwrap_or(0),
                city: row.to_value("city").unwrap_or(None),
                geometry: parse_linestring_wkt(&wkt),
            })
        })
        .collect()
}

fn parse_linestring_wkt(wkt: &str) -> Vec<GeoPoint> {
    wkt.trim_start_matches("LINESTRING(")
        .trim_end_matches(')')
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.trim().split_whitespace();
            let longitude: f64 = parts.next()?.parse().ok()?;
            let latitude: f64 = parts.next()?.parse().ok()?;
            Some(GeoPoint { longitude, latitude })
        })
        .collect()
}

/// Looks up a city or region centroid for the geocoder's third tier.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn lookup_centroid(db: &dyn Database, region: &str, city: Option<&str>) -> Result<Option<GeoPoint>, DbError> {
    let rows = if let Some(city) = city {
        db.query_raw_params(
            "SELECT longitude, latitude FROM region_centroids WHERE region = $1 AND city = $2",
            &[DatabaseValue::String(region.to_string()), DatabaseValue::String(city.to_string())],
        )
        .await?
    } else {
        Vec::new()
    };

    if let Some(row) = rows.first() {
        return Ok(Some(GeoPoint {
            longitude: row.to_value("longitude").unwrap_or(0.0),
            latitude: row.to_value("latitude").unwrap_or(0.0),
        }));
    }

    let region_rows = db
        .query_raw_params(
            "SELECT longitude, latitude FROM region_centroids WHERE region = $1 AND city IS NULL",
            &[DatabaseValue::String(region.to_string())],
        )
        .await?;

    Ok(region_rows.first().map(|row| GeoPoint {
        longitude: row.to_value("longitude").unwrap_or(0.0),
        latitude: row.to_value("latitude").unwrap_or(0.0),
    }))
}

/// Counts incidents by category within `[week_start, week_start + 7d)`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_incidents_by_category(
    db: &dyn Database,
    municipality: Option<&str>,
    week_start: NaiveDate,
) -> Result<BTreeMap<IncidentCategory, u32>, DbError> {
    let rows = if let Some(municipality) = municipality {
        db.query_raw_params(
            "SELECT category, COUNT(*) AS n FROM incidents
             WHERE city = $1 AND occurred_at >= $2 AND occurred_at < $2 + INTERVAL '7 days'
             GROUP BY category",
            &[
                DatabaseValue::String(municipality.to_string()),
                DatabaseValue::DateTime(week_start.and_hms_opt(0, 0, 0).unwrap()),
            ],
        )
        .await?
    } else {
        db.query_raw_params(
            "SELECT category, COUNT(*) AS n FROM incidents
             WHERE occurred_at >= $1 AND occurred_at < $1 + INTERVAL '7 days'
             GROUP BY category",
            &[DatabaseValue::DateTime(week_start.and_hms_opt(0, 0, 0).unwrap())],
        )
        .await?
    };

    let mut map = BTreeMap::new();
    for row in &rows {
        let category_raw: String = row.to_value("category").unwrap_or_default();
        if let Ok(category) = category_raw.parse::<IncidentCategory>() {
            map.insert(category, u32::try_from(row.to_value::<i64>("n").unwrap_or(0)).unwrap_or(0));
        }
    }
    Ok(map)
}

/// Counts news-type reports (source category = news) by their extracted
/// category, over the same weekly window, scoped to `municipality` (`None`
/// ⇒ region-wide, matching [`count_incidents_by_category`]'s scoping).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_news_by_category(
    db: &dyn Database,
    municipality: Option<&str>,
    week_start: NaiveDate,
) -> Result<BTreeMap<IncidentCategory, u32>, DbError> {
    let rows = if let Some(municipality) = municipality {
        db.query_raw_params(
            "SELECT r.extracted_category AS category, COUNT(*) AS n
             FROM incident_reports r
             JOIN sources s ON s.id = r.source_id
             WHERE s.category = 'news'
               AND r.extracted_category IS NOT NULL
               AND r.city = $1
               AND COALESCE(r.occurred_at, r.ingested_at) >= $2
               AND COALESCE(r.occurred_at, r.ingested_at) < $2 + INTERVAL '7 days'
             GROUP BY r.extracted_category",
            &[
                DatabaseValue::String(municipality.to_string()),
                DatabaseValue::DateTime(week_start.and_hms_opt(0, 0, 0).unwrap()),
            ],
        )
        .await?
    } else {
        db.query_raw_params(
            "SELECT r.extracted_category AS category, COUNT(*) AS n
             FROM incident_reports r
             JOIN sources s ON s.id = r.source_id
             WHERE s.category = 'news'
               AND r.extracted_category IS NOT NULL
               AND COALESCE(r.occurred_at, r.ingested_at) >= $1
               AND COALESCE(r.occurred_at, r.ingested_at) < $1 + INTERVAL '7 days'
             GROUP BY r.extracted_category",
            &[DatabaseValue::DateTime(week_start.and_hms_opt(0, 0, 0).unwrap())],
        )
        .await?
    };

    let mut map = BTreeMap::new();
    for row in &rows {
        let category_raw: String = row.to_value("category").unwrap_or_default();
        if let Ok(category) = category_raw.parse::<IncidentCategory>() {
            map.insert(category, u32::try_from(row.to_value::<i64>("n").unwrap_or(0)).unwrap_or(0));
        }
    }
    Ok(map)
}

/// Upserts a weekly rollup row, idempotent on `(week_start, municipality)`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_weekly_rollup(db: &dyn Database, rollup: &WeeklyRollupRow) -> Result<(), DbError> {
    let incidents_json = serde_json::to_string(&rollup.incidents_by_category).map_err(|e| DbError::Conversion {
        message: format!("failed to serialize incidents_by_category: {e}"),
    })?;
    let news_json = serde_json::to_string(&rollup.news_by_category).map_err(|e| DbError::Conversion {
        message: format!("failed to serialize news_by_category: {e}"),
    })?;

    db.exec_raw_params(
        "INSERT INTO weekly_rollups (
            id, week_start, municipality, incidents_by_category, news_by_category,
            incident_trend, summary_text, created_at
         ) VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, NOW())
         ON CONFLICT (week_start, COALESCE(municipality, '')) DO UPDATE SET
             incidents_by_category = EXCLUDED.incidents_by_category,
             news_by_category = EXCLUDED.news_by_category,
             incident_trend = EXCLUDED.incident_trend,
             summary_text = EXCLUDED.summary_text",
        &[
            DatabaseValue::DateTime(rollup.week_start.and_hms_opt(0, 0, 0).unwrap()),
            rollup.municipality.clone().map_or(DatabaseValue::Null, DatabaseValue::String),
            DatabaseValue::String(incidents_json),
            DatabaseValue::String(news_json),
            DatabaseValue::Int32(rollup.incident_trend),
            DatabaseValue::String(rollup.summary_text.clone()),
        ],
    )
    .await?;
    Ok(())
}

/// Fetches up to `weeks` most recent rollups for `municipality` (`None` ⇒
/// region-wide).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_rollups(db: &dyn Database, query: &RollupQuery) -> Result<Vec<WeeklyRollupRow>, DbError> {
    let weeks = query.weeks.min(12);
    let rows = db
        .query_raw_params(
            "SELECT id, week_start, municipality, incidents_by_category, news_by_category,
                    incident_trend, summary_text, created_at
             FROM weekly_rollups
             WHERE COALESCE(municipality, '') = COALESCE($1, '')
             ORDER BY week_start DESC
             LIMIT $2",
            &[
                query.municipality.clone().map_or(DatabaseValue::Null, DatabaseValue::String),
                DatabaseValue::Int64(i64::from(weeks)),
            ],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let incidents_raw: String = row.to_value("incidents_by_category").unwrap_or_else(|_| "{}".to_string());
            let news_raw: String = row.to_value("news_by_category").unwrap_or_else(|_| "{}".to_string());
            let week_start_naive: chrono::NaiveDateTime = row.to_value("week_start").unwrap_or_default();
            let created_naive: chrono::NaiveDateTime = row.to_value("created_at").unwrap_or_default();

            Ok(WeeklyRollupRow {
                id: to_uuid(row, "id")?,
                week_start: week_start_naive.date(),
                municipality: row.to_value("municipality").unwrap_or(None),
                incidents_by_category: serde_json::from_str(&incidents_raw).unwrap_or_default(),
                news_by_category: serde_json::from_str(&news_raw).unwrap_or_default(),
                incident_trend: row.to_value("incident_trend").unwrap_or(0),
                summary_text: row.to_value("summary_text").unwrap_or_default(),
                created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_naive, Utc),
            })
        })
        .collect()
}

/// Live "last 24h" / "last 7d" counts returned alongside rollup history.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_recent(db: &dyn Database, municipality: Option<&str>, hours: i64) -> Result<u32, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS n FROM incidents
             WHERE COALESCE(city, '') = COALESCE($1, city, '')
               AND occurred_at >= NOW() - make_interval(hours => $2)",
            &[
                municipality.map_or(DatabaseValue::Null, |m| DatabaseValue::String(m.to_string())),
                DatabaseValue::Int64(hours),
            ],
        )
        .await?;

    Ok(rows.first().map_or(0, |row| u32::try_from(row.to_value::<i64>("n").unwrap_or(0)).unwrap_or(0)))
}
