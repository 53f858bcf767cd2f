//! Pure candidate scoring and tie-break — §4.5.
//!
//! No I/O: operates on the [`DedupCandidate`] rows already returned by
//! `find_dedup_candidates`'s spatiotemporal search.

use nightwatch_database_models::DedupCandidate;
use uuid::Uuid;

/// Search radius, meters.
pub const SEARCH_RADIUS_METERS: f64 = 300.0;
/// Search time window, hours (applied symmetrically: ± this many hours).
pub const SEARCH_WINDOW_HOURS: i64 = 3;

/// The match-score threshold above which a candidate is linked rather
/// than treated as a new incident.
///
/// Per `SPEC_FULL` §9 Open Question: the source material expresses this
/// only as an inferred constant; `0.55` is the canonical value and is
/// deliberately exposed here as a named constant rather than folded into
/// the formula, so a future config layer can override it without
/// touching the scoring logic.
pub const MATCH_THRESHOLD: f64 = 0.55;

/// Computes the §4.5 weighted match score for one candidate.
///
/// All three weights are retained even when a term is zero, so a
/// candidate with a missing `occurred_at` (time delta `f64::MAX`) or a
/// mismatched type still ranks correctly against other candidates.
#[must_use]
pub fn score(candidate: &DedupCandidate) -> f64 {
    let distance_term = (1.0 - candidate.distance_meters / SEARCH_RADIUS_METERS).clamp(0.0, 1.0);
    let time_term = (1.0 - candidate.time_delta_minutes.abs() / (SEARCH_WINDOW_HOURS as f64 * 60.0)).clamp(0.0, 1.0);
    let type_term = f64::from(u8::from(candidate.incident_type_matches));

    0.5 * distance_term + 0.3 * time_term + 0.2 * type_term
}

/// Picks the best candidate by score, breaking ties by smallest
/// distance, then smallest time delta, then smallest incident id
/// (stable per §4.5).
#[must_use]
pub fn best_candidate(candidates: &[DedupCandidate]) -> Option<&DedupCandidate> {
    candidates.iter().max_by(|a, b| {
        score(a)
            .total_cmp(&score(b))
            .then_with(|| b.distance_meters.total_cmp(&a.distance_meters))
            .then_with(|| b.time_delta_minutes.abs().total_cmp(&a.time_delta_minutes.abs()))
            .then_with(|| cmp_uuid_desc(a.incident_id, b.incident_id))
    })
}

/// Reverses `Uuid` comparison so that, combined with `max_by`'s
/// greatest-wins semantics, the *smallest* id wins the final tie-break.
fn cmp_uuid_desc(a: Uuid, b: Uuid) -> std::cmp::Ordering {
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::{best_candidate, score, MATCH_THRESHOLD};
    use nightwatch_database_models::DedupCandidate;
    use uuid::Uuid;

    fn candidate(id: Uuid, distance: f64, time_delta: f64, type_matches: bool) -> DedupCandidate {
        DedupCandidate {
            incident_id: id,
            distance_meters: distance,
            time_delta_minutes: time_delta,
            incident_type_matches: type_matches,
        }
    }

    #[test]
    fn close_in_space_and_time_same_type_meets_threshold() {
        let c = candidate(Uuid::nil(), 20.0, 30.0, true);
        assert!(score(&c) >= MATCH_THRESHOLD);
    }

    #[test]
    fn far_outside_radius_does_not_meet_threshold() {
        // The candidate search never actually returns anything beyond
        // the 300m radius; this just pins scoring behavior if called
        // directly with an out-of-radius input.
        let c = candidate(Uuid::nil(), 400.0, 60.0, true);
        assert!(score(&c) < MATCH_THRESHOLD);
    }

    #[test]
    fn missing_time_and_type_still_contributes_distance_term() {
        let c = candidate(Uuid::nil(), 0.0, f64::MAX, false);
        // distance term = 1.0 * 0.5 = 0.5; time/type terms are 0
        assert!((score(&c) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tie_break_prefers_smaller_distance() {
        let near = candidate(Uuid::from_u128(2), 10.0, 30.0, true);
        let far = candidate(Uuid::from_u128(1), 50.0, 30.0, true);
        let best = best_candidate(&[far.clone(), near.clone()]).unwrap();
        assert_eq!(best.incident_id, near.incident_id);
    }

    #[test]
    fn tie_break_falls_to_smallest_incident_id_when_fully_tied() {
        let a = candidate(Uuid::from_u128(5), 10.0, 30.0, true);
        let b = candidate(Uuid::from_u128(2), 10.0, 30.0, true);
        let best = best_candidate(&[a, b.clone()]).unwrap();
        assert_eq!(best.incident_id, b.incident_id);
    }

    #[test]
    fn best_candidate_of_empty_slice_is_none() {
        assert!(best_candidate(&[]).is_none());
    }
}
