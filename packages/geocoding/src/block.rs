//! Block tier: resolves a `<number> block of <street>` address against
//! known street centerlines, placing the incident at the midpoint of the
//! matching segment.
//!
//! Confidence for this tier is fixed at 0.70.

use async_trait::async_trait;
use nightwatch_database::queries;
use nightwatch_database_models::{GeoPoint, LocationResolution, StreetCenterlineRow};
use switchy_database::Database;

use crate::address::parse_block_pattern;
use crate::{GeocodeError, GeocodeTier};

/// Block-tier provider backed by `street_centerlines`.
pub struct BlockTier<'db> {
    db: &'db dyn Database,
}

impl<'db> BlockTier<'db> {
    #[must_use]
    pub const fn new(db: &'db dyn Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GeocodeTier for BlockTier<'_> {
    async fn resolve(
        &self,
        address: Option<&str>,
        _city: Option<&str>,
        region: &str,
    ) -> Result<Option<GeoPoint>, GeocodeError> {
        let Some(raw) = address else {
            return Ok(None);
        };
        let Some(pattern) = parse_block_pattern(raw) else {
            return Ok(None);
        };

        let centerlines = queries::find_centerlines_for_block(
            self.db,
            region,
            &pattern.street_normalized,
            pattern.block_number,
        )
        .await
        .map_err(|err| GeocodeError::Lookup {
            message: err.to_string(),
        })?;

        Ok(centerlines.first().map(centerline_midpoint))
    }

    fn resolution(&self) -> LocationResolution {
        LocationResolution::Block
    }
}

/// The geometric midpoint of a centerline's geometry, used as the
/// incident location when the block tier matches.
fn centerline_midpoint(centerline: &StreetCenterlineRow) -> GeoPoint {
    let points = &centerline.geometry;
    if points.is_empty() {
        return GeoPoint {
            longitude: 0.0,
            latitude: 0.0,
        };
    }
    let count = points.len() as f64;
    let (longitude_sum, latitude_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lon, lat), point| (lon + point.longitude, lat + point.latitude));
    GeoPoint {
        longitude: longitude_sum / count,
        latitude: latitude_sum / count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_of_two_point_segment() {
        let centerline = StreetCenterlineRow {
            id: uuid::Uuid::nil(),
            region: "test".to_string(),
            street_name: "Main St".to_string(),
            street_name_normalized: "MAIN".to_string(),
            from_address: 100,
            to_address: 200,
            city: None,
            geometry: vec![
                GeoPoint {
                    longitude: -76.0,
                    latitude: 39.0,
                },
                GeoPoint {
                    longitude: -76.2,
                    latitude: 39.2,
                },
            ],
        };
        let midpoint = centerline_midpoint(&centerline);
        assert!((midpoint.longitude - (-76.1)).abs() < 1e-9);
        assert!((midpoint.latitude - 39.1).abs() < 1e-9);
    }

    #[test]
    fn midpoint_of_empty_geometry_is_origin() {
        let centerline = StreetCenterlineRow {
            id: uuid::Uuid::nil(),
            region: "test".to_string(),
            street_name: "Main St".to_string(),
            street_name_normalized: "MAIN".to_string(),
            from_address: 100,
            to_address: 200,
            city: None,
            geometry: vec![],
        };
        let midpoint = centerline_midpoint(&centerline);
        assert!((midpoint.longitude).abs() < f64::EPSILON);
        assert!((midpoint.latitude).abs() < f64::EPSILON);
    }
}
