//! Pure confidence aggregation — §4.6.
//!
//! No I/O: the caller fetches the linked-report set and hands it here.
//! Kept side-effect-free so the formula can be unit tested directly and
//! so `recompute_and_store` is the only place the transaction boundary
//! matters.

use nightwatch_database_models::ReviewStatus;
use nightwatch_source_models::SourceType;

use crate::LinkedReportSummary;

/// `confidence ≥ 0.9` → `auto_published`.
const AUTO_PUBLISH_THRESHOLD: f64 = 0.9;
/// `0.6 ≤ confidence < 0.9` → `unverified`.
const UNVERIFIED_THRESHOLD: f64 = 0.6;

/// The derived tuple `(report_count, source_types, confidence_score,
/// proposed_status)` computed from the current linked-report set.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub report_count: u32,
    pub source_types: Vec<SourceType>,
    pub confidence_score: f64,
    pub proposed_status: ReviewStatus,
}

/// Computes the §4.6 derived tuple for an incident from its current set
/// of linked (non-rejected) reports.
///
/// `confidence = min(0.99, avg_ec + 0.05·min(n_reports−1,3) +
/// 0.10·min(n_source_kinds−1,2))`. An incident with no linked reports
/// (should not occur in practice — an incident always has at least the
/// report that created it) gets confidence 0 and `needs_review`.
#[must_use]
pub fn recompute(linked: &[LinkedReportSummary]) -> DerivedState {
    let n_reports = linked.len();

    if n_reports == 0 {
        return DerivedState {
            report_count: 0,
            source_types: Vec::new(),
            confidence_score: 0.0,
            proposed_status: ReviewStatus::NeedsReview,
        };
    }

    let avg_ec: f64 = linked.iter().map(|r| r.extraction_confidence).sum::<f64>() / n_reports as f64;

    let mut source_types: Vec<SourceType> = linked.iter().map(|r| r.source_type).collect();
    source_types.sort_unstable();
    source_types.dedup();
    let n_source_kinds = source_types.len();

    #[allow(clippy::cast_precision_loss)]
    let report_bonus = 0.05 * f64::from(u32::try_from(n_reports.saturating_sub(1)).unwrap_or(u32::MAX).min(3));
    #[allow(clippy::cast_precision_loss)]
    let source_bonus = 0.10 * f64::from(u32::try_from(n_source_kinds.saturating_sub(1)).unwrap_or(u32::MAX).min(2));

    let confidence_score = (avg_ec + report_bonus + source_bonus).min(0.99);

    let proposed_status = if confidence_score >= AUTO_PUBLISH_THRESHOLD {
        ReviewStatus::AutoPublished
    } else if confidence_score >= UNVERIFIED_THRESHOLD {
        ReviewStatus::Unverified
    } else {
        ReviewStatus::NeedsReview
    };

    DerivedState {
        report_count: u32::try_from(n_reports).unwrap_or(u32::MAX),
        source_types,
        confidence_score,
        proposed_status,
    }
}

#[cfg(test)]
mod tests {
    use super::{recompute, LinkedReportSummary};
    use nightwatch_database_models::ReviewStatus;
    use nightwatch_source_models::SourceType;

    fn report(ec: f64, source_type: SourceType) -> LinkedReportSummary {
        LinkedReportSummary {
            extraction_confidence: ec,
            source_type,
        }
    }

    /// Scenario A — link across sources.
    #[test]
    fn scenario_a_link_across_sources() {
        let linked = vec![report(0.80, SourceType::Audio), report(0.85, SourceType::Html)];
        let derived = recompute(&linked);
        assert_eq!(derived.report_count, 2);
        assert_eq!(derived.source_types, vec![SourceType::Html, SourceType::Audio]);
        assert!((derived.confidence_score - 0.975).abs() < 1e-9);
        assert_eq!(derived.proposed_status, ReviewStatus::AutoPublished);
    }

    /// Scenario C — a single low-confidence extraction routes to
    /// `needs_review` with confidence equal to the bare self-report.
    #[test]
    fn scenario_c_low_confidence_queue() {
        let linked = vec![report(0.50, SourceType::Html)];
        let derived = recompute(&linked);
        assert_eq!(derived.report_count, 1);
        assert!((derived.confidence_score - 0.50).abs() < 1e-9);
        assert_eq!(derived.proposed_status, ReviewStatus::NeedsReview);
    }

    #[test]
    fn bonuses_cap_at_three_reports_and_two_source_kinds() {
        let linked = vec![
            report(0.5, SourceType::Html),
            report(0.5, SourceType::Rss),
            report(0.5, SourceType::Api),
            report(0.5, SourceType::Audio),
            report(0.5, SourceType::Manual),
        ];
        let derived = recompute(&linked);
        // avg_ec = 0.5, report bonus capped at 0.05*3=0.15, source bonus capped at 0.10*2=0.20
        assert!((derived.confidence_score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn confidence_never_exceeds_ninety_nine_hundredths() {
        let linked: Vec<_> = (0..5).map(|_| report(1.0, SourceType::Html)).collect();
        let derived = recompute(&linked);
        assert!(derived.confidence_score <= 0.99);
    }

    #[test]
    fn empty_linked_set_is_needs_review() {
        let derived = recompute(&[]);
        assert_eq!(derived.report_count, 0);
        assert_eq!(derived.proposed_status, ReviewStatus::NeedsReview);
    }
}
