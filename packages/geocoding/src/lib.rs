#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Three-tier geocoder for incident locations.
//!
//! Resolves a street address down to coordinates by trying, in order:
//!
//! 1. **Parcel** — an external address-lookup service (US Census Bureau
//!    geocoder), confidence 0.95 on match.
//! 2. **Block** — a `<number> block of <street>` pattern matched against
//!    known street centerlines, confidence 0.70 on match.
//! 3. **Centroid** — the city or region centroid, confidence 0.30.
//!
//! If none of the tiers resolve, the result is [`LocationResolution::Unknown`]
//! with confidence 0 and no point.

pub mod address;
pub mod block;
pub mod centroid;
pub mod parcel;

use async_trait::async_trait;
use nightwatch_database_models::{GeoPoint, LocationResolution};
use thiserror::Error;

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The underlying datastore returned an error while consulting
    /// centerlines or centroids.
    #[error("Lookup error: {message}")]
    Lookup {
        /// Description of the lookup failure.
        message: String,
    },
}

/// The outcome of resolving an address through the tier cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    /// The resolved point, if any tier matched.
    pub point: Option<GeoPoint>,
    /// Which tier produced the point (or [`LocationResolution::Unknown`]).
    pub resolution: LocationResolution,
    /// The confidence associated with `resolution`.
    pub confidence: f64,
}

impl GeocodeResult {
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            point: None,
            resolution: LocationResolution::Unknown,
            confidence: 0.0,
        }
    }

    #[must_use]
    pub fn at(point: GeoPoint, resolution: LocationResolution) -> Self {
        Self {
            confidence: resolution.confidence(),
            point: Some(point),
            resolution,
        }
    }
}

/// A single tier of the geocoding cascade.
///
/// Implementors attempt to resolve an address and return `Ok(None)` when
/// they simply don't have a match (as opposed to a hard error), so the
/// caller can fall through to the next tier.
#[async_trait]
pub trait GeocodeTier: Send + Sync {
    async fn resolve(
        &self,
        address: Option<&str>,
        city: Option<&str>,
        region: &str,
    ) -> Result<Option<GeoPoint>, GeocodeError>;

    fn resolution(&self) -> LocationResolution;
}

/// Runs the parcel, block, and centroid tiers in order and returns the
/// first match, or [`GeocodeResult::unknown`] if none resolve.
///
/// Generic over the tier objects' lifetime so callers whose tiers borrow
/// a `&dyn Database` (block, centroid) don't need `'static` trait
/// objects just to call this function.
pub async fn geocode<'a>(
    tiers: &[Box<dyn GeocodeTier + 'a>],
    address: Option<&str>,
    city: Option<&str>,
    region: &str,
) -> Result<GeocodeResult, GeocodeError> {
    for tier in tiers {
        if let Some(point) = tier.resolve(address, city, region).await? {
            return Ok(GeocodeResult::at(point, tier.resolution()));
        }
    }
    Ok(GeocodeResult::unknown())
}
