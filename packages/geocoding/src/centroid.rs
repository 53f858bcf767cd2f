//! Centroid tier: the fallback when neither a street lookup nor a block
//! pattern resolves. Uses the incident's city centroid if known, else the
//! region-wide centroid.
//!
//! Confidence for this tier is fixed at 0.30.

use async_trait::async_trait;
use nightwatch_database::queries;
use nightwatch_database_models::{GeoPoint, LocationResolution};
use switchy_database::Database;

use crate::{GeocodeError, GeocodeTier};

/// Centroid-tier provider backed by `region_centroids`.
pub struct CentroidTier<'db> {
    db: &'db dyn Database,
}

impl<'db> CentroidTier<'db> {
    #[must_use]
    pub const fn new(db: &'db dyn Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GeocodeTier for CentroidTier<'_> {
    async fn resolve(
        &self,
        _address: Option<&str>,
        city: Option<&str>,
        region: &str,
    ) -> Result<Option<GeoPoint>, GeocodeError> {
        queries::lookup_centroid(self.db, region, city)
            .await
            .map_err(|err| GeocodeError::Lookup {
                message: err.to_string(),
            })
    }

    fn resolution(&self) -> LocationResolution {
        LocationResolution::Centroid
    }
}
