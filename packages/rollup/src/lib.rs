#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rollup engine — §4.7.
//!
//! Produces a [`nightwatch_database_models::WeeklyRollupRow`] for a given
//! `(week_start, municipality)` scope: per-category incident and news
//! counts over the week, a trend delta against the prior week, and a
//! deterministic summary string. Runs as a scheduled weekly job and as an
//! on-demand CLI subcommand; both paths call [`run`].

use chrono::{Datelike, NaiveDate};
use nightwatch_database_models::WeeklyRollupRow;
use nightwatch_taxonomy_models::IncidentCategory;
use switchy_database::Database;
use thiserror::Error;

/// Errors from the rollup engine.
#[derive(Debug, Error)]
pub enum RollupError {
    /// The underlying datastore call failed.
    #[error("database error: {0}")]
    Database(#[from] nightwatch_database::DbError),
}

/// Rounds `date` back to the Monday of its week (week begins Monday, per
/// `WeeklyRollup`'s invariant).
#[must_use]
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let days_since_monday = i64::from(date.weekday().num_days_from_monday());
    date - chrono::Duration::days(days_since_monday)
}

/// Computes `incident_trend`: `round(100·(current−previous)/previous)`,
/// or `100` if `previous == 0 && current > 0`, or `0` if both are zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn trend(current: u32, previous: u32) -> i32 {
    if previous == 0 {
        return i32::from(current > 0) * 100;
    }
    (100.0 * (f64::from(current) - f64::from(previous)) / f64::from(previous)).round() as i32
}

/// Builds the deterministic summary line for a rollup. Wording is not
/// normative; the counts and trend it's derived from are.
#[must_use]
pub fn summary_text(
    municipality: Option<&str>,
    total_incidents: u32,
    incidents_by_category: &std::collections::BTreeMap<IncidentCategory, u32>,
    trend: i32,
) -> String {
    let scope = municipality.map_or_else(|| "the region".to_string(), ToString::to_string);

    let leading_category = incidents_by_category
        .iter()
        .max_by_key(|(_, count)| **count)
        .filter(|(_, count)| **count > 0);

    let trend_phrase = match trend.cmp(&0) {
        std::cmp::Ordering::Greater => format!("up {trend}% from the prior week"),
        std::cmp::Ordering::Less => format!("down {}% from the prior week", trend.abs()),
        std::cmp::Ordering::Equal => "flat vs. the prior week".to_string(),
    };

    leading_category.map_or_else(
        || format!("{total_incidents} incidents reported in {scope} this week, {trend_phrase}."),
        |(category, count)| {
            format!(
                "{total_incidents} incidents reported in {scope} this week, {trend_phrase}. Leading category: {category} ({count})."
            )
        },
    )
}

/// Computes and upserts the `(week_start, municipality)` rollup row.
///
/// Idempotent: running this twice for the same inputs upserts the same
/// row (§8 testable property 6).
///
/// # Errors
///
/// Returns [`RollupError`] if any datastore call fails.
pub async fn run(db: &dyn Database, week_start: NaiveDate, municipality: Option<&str>) -> Result<WeeklyRollupRow, RollupError> {
    let incidents_by_category =
        nightwatch_database::queries::count_incidents_by_category(db, municipality, week_start).await?;
    let news_by_category = nightwatch_database::queries::count_news_by_category(db, municipality, week_start).await?;

    let previous_week = week_start - chrono::Duration::days(7);
    let previous_incidents_by_category =
        nightwatch_database::queries::count_incidents_by_category(db, municipality, previous_week).await?;

    let current_total: u32 = incidents_by_category.values().sum();
    let previous_total: u32 = previous_incidents_by_category.values().sum();
    let incident_trend = trend(current_total, previous_total);

    let summary_text = summary_text(municipality, current_total, &incidents_by_category, incident_trend);

    let row = WeeklyRollupRow {
        id: uuid::Uuid::nil(),
        week_start,
        municipality: municipality.map(ToString::to_string),
        incidents_by_category,
        news_by_category,
        incident_trend,
        summary_text,
        created_at: chrono::Utc::now(),
    };

    nightwatch_database::queries::upsert_weekly_rollup(db, &row).await?;
    Ok(row)
}

/// Live "last 24h" / "last 7d" counts returned alongside rollup history
/// for `GET /rollup` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCounts {
    pub last_24h: u32,
    pub last_7d: u32,
}

/// Fetches the live counts accompanying a rollup history query.
///
/// # Errors
///
/// Returns [`RollupError`] if any datastore call fails.
pub async fn live_counts(db: &dyn Database, municipality: Option<&str>) -> Result<LiveCounts, RollupError> {
    let last_24h = nightwatch_database::queries::count_recent(db, municipality, 24).await?;
    let last_7d = nightwatch_database::queries::count_recent(db, municipality, 24 * 7).await?;
    Ok(LiveCounts { last_24h, last_7d })
}

#[cfg(test)]
mod tests {
    use super::{trend, week_start_of};
    use chrono::{Datelike as _, NaiveDate};

    #[test]
    fn week_start_of_a_monday_is_itself() {
        let monday = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();
        assert_eq!(monday.weekday(), chrono::Weekday::Mon);
        assert_eq!(week_start_of(monday), monday);
    }

    #[test]
    fn week_start_of_a_sunday_rolls_back_to_monday() {
        let sunday = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        assert_eq!(sunday.weekday(), chrono::Weekday::Sun);
        assert_eq!(week_start_of(sunday), NaiveDate::from_ymd_opt(2026, 7, 20).unwrap());
    }

    /// Scenario F — rollup trend.
    #[test]
    fn scenario_f_rollup_trend() {
        assert_eq!(trend(10, 8), 25);
    }

    #[test]
    fn trend_with_zero_previous_and_positive_current_is_100() {
        assert_eq!(trend(5, 0), 100);
    }

    #[test]
    fn trend_with_both_zero_is_zero() {
        assert_eq!(trend(0, 0), 0);
    }

    #[test]
    fn trend_handles_decrease() {
        assert_eq!(trend(4, 8), -50);
    }
}
