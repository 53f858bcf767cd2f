#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Closed-set incident category taxonomy and urgency scoring.
//!
//! The category enum mirrors the fixed nine-value set extraction is
//! constrained to; anything an extraction produces outside this set is a
//! malformed extraction, not a new category.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The closed set of incident categories an extraction may produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentCategory {
    ViolentCrime,
    PropertyCrime,
    Fire,
    Medical,
    Traffic,
    Drugs,
    MissingPerson,
    Suspicious,
    Other,
}

impl IncidentCategory {
    /// All categories, in a stable canonical order.
    #[must_use]
    pub const fn all() -> [Self; 9] {
        [
            Self::ViolentCrime,
            Self::PropertyCrime,
            Self::Fire,
            Self::Medical,
            Self::Traffic,
            Self::Drugs,
            Self::MissingPerson,
            Self::Suspicious,
            Self::Other,
        ]
    }
}

/// Error returned when parsing an urgency score outside `1..=10`.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("invalid urgency score: {0} (must be 1..=10)")]
pub struct InvalidUrgencyScoreError(pub u8);

/// The four urgency bands an `urgency_score` falls into.
///
/// Bands are derived, never stored directly — `urgency_score` is the
/// value persisted on `Incident`/`IncidentReport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Informational,
    Notable,
    SeriousActive,
    LifeSafety,
}

impl UrgencyTier {
    /// Derives the tier for a raw urgency score.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUrgencyScoreError`] if `score` is not in `1..=10`.
    pub fn from_score(score: u8) -> Result<Self, InvalidUrgencyScoreError> {
        match score {
            1..=3 => Ok(Self::Informational),
            4..=6 => Ok(Self::Notable),
            7..=8 => Ok(Self::SeriousActive),
            9..=10 => Ok(Self::LifeSafety),
            other => Err(InvalidUrgencyScoreError(other)),
        }
    }
}

/// Validates and wraps a raw urgency score in the `1..=10` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct UrgencyScore(u8);

impl UrgencyScore {
    /// Builds a validated urgency score.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUrgencyScoreError`] if `value` is not in `1..=10`.
    pub fn new(value: u8) -> Result<Self, InvalidUrgencyScoreError> {
        if (1..=10).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidUrgencyScoreError(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn tier(self) -> UrgencyTier {
        UrgencyTier::from_score(self.0).expect("validated at construction")
    }
}

impl TryFrom<u8> for UrgencyScore {
    type Error = InvalidUrgencyScoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UrgencyScore> for u8 {
    fn from(value: UrgencyScore) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::{IncidentCategory, InvalidUrgencyScoreError, UrgencyScore, UrgencyTier};
    use std::str::FromStr;

    #[test]
    fn category_round_trips_through_display_and_from_str() {
        for category in IncidentCategory::all() {
            let rendered = category.to_string();
            let parsed = IncidentCategory::from_str(&rendered).unwrap();
            assert_eq!(category, parsed);
        }
    }

    #[test]
    fn category_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&IncidentCategory::MissingPerson).unwrap();
        assert_eq!(json, "\"MISSING_PERSON\"");
    }

    #[test]
    fn urgency_tier_bands_match_boundaries() {
        assert_eq!(UrgencyTier::from_score(1).unwrap(), UrgencyTier::Informational);
        assert_eq!(UrgencyTier::from_score(3).unwrap(), UrgencyTier::Informational);
        assert_eq!(UrgencyTier::from_score(4).unwrap(), UrgencyTier::Notable);
        assert_eq!(UrgencyTier::from_score(6).unwrap(), UrgencyTier::Notable);
        assert_eq!(UrgencyTier::from_score(7).unwrap(), UrgencyTier::SeriousActive);
        assert_eq!(UrgencyTier::from_score(8).unwrap(), UrgencyTier::SeriousActive);
        assert_eq!(UrgencyTier::from_score(9).unwrap(), UrgencyTier::LifeSafety);
        assert_eq!(UrgencyTier::from_score(10).unwrap(), UrgencyTier::LifeSafety);
    }

    #[test]
    fn urgency_tier_rejects_out_of_range() {
        assert!(matches!(UrgencyTier::from_score(0), Err(InvalidUrgencyScoreError(0))));
        assert!(matches!(UrgencyTier::from_score(11), Err(InvalidUrgencyScoreError(11))));
    }

    #[test]
    fn urgency_score_rejects_zero() {
        assert!(UrgencyScore::new(0).is_err());
    }

    #[test]
    fn urgency_score_exposes_tier() {
        let score = UrgencyScore::new(9).unwrap();
        assert_eq!(score.tier(), UrgencyTier::LifeSafety);
    }
}
