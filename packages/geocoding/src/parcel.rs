//! Parcel tier: resolves a full street address via the US Census Bureau
//! public geocoder (no API key required).
//!
//! This is the highest-confidence tier (0.95) — it only fires when the
//! incident has a street address at all; block-level and intersection
//! addresses fall through to the block/centroid tiers.

use async_trait::async_trait;
use nightwatch_database_models::{GeoPoint, LocationResolution};
use serde_json::Value;

use crate::{GeocodeError, GeocodeTier};

const CENSUS_GEOCODER_URL: &str =
    "https://geocoding.geo.census.gov/geocoder/locations/onelineaddress";

/// Calls the Census Bureau's one-line-address geocoder for a single
/// address and returns the first match's coordinates, if any.
async fn geocode_single(client: &reqwest::Client, one_line: &str) -> Result<Option<GeoPoint>, GeocodeError> {
    let response = client
        .get(CENSUS_GEOCODER_URL)
        .query(&[
            ("address", one_line),
            ("benchmark", "Public_AR_Current"),
            ("format", "json"),
        ])
        .send()
        .await?
        .error_for_status()?;

    let body: Value = response.json().await?;
    parse_single_response(&body)
}

fn parse_single_response(body: &Value) -> Result<Option<GeoPoint>, GeocodeError> {
    let matches = body
        .get("result")
        .and_then(|r| r.get("addressMatches"))
        .and_then(Value::as_array)
        .ok_or_else(|| GeocodeError::Parse {
            message: "missing result.addressMatches".to_string(),
        })?;

    let Some(first) = matches.first() else {
        return Ok(None);
    };

    let coordinates = first.get("coordinates").ok_or_else(|| GeocodeError::Parse {
        message: "match missing coordinates".to_string(),
    })?;

    let longitude = coordinates
        .get("x")
        .and_then(Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "coordinates missing x".to_string(),
        })?;
    let latitude = coordinates
        .get("y")
        .and_then(Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "coordinates missing y".to_string(),
        })?;

    Ok(Some(GeoPoint { longitude, latitude }))
}

/// Parcel-tier provider backed by the Census Bureau geocoder.
///
/// Only attempts a lookup when a street address is present; returns
/// `Ok(None)` (not an error) on no-match so the cascade falls through to
/// the block tier.
pub struct ParcelTier {
    client: reqwest::Client,
    state: String,
}

impl ParcelTier {
    #[must_use]
    pub fn new(client: reqwest::Client, state: String) -> Self {
        Self { client, state }
    }
}

#[async_trait]
impl GeocodeTier for ParcelTier {
    async fn resolve(
        &self,
        address: Option<&str>,
        city: Option<&str>,
        _region: &str,
    ) -> Result<Option<GeoPoint>, GeocodeError> {
        let Some(street) = address else {
            return Ok(None);
        };
        let cleaned = crate::address::clean_block_address(street);
        let crate::address::CleanedAddress::Street(street) = cleaned else {
            return Ok(None);
        };

        let one_line = match city {
            Some(city) => crate::address::build_one_line_address(&street, city, &self.state),
            None => format!("{street}, {}", self.state),
        };

        geocode_single(&self.client, &one_line).await
    }

    fn resolution(&self) -> LocationResolution {
        LocationResolution::Parcel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_match() {
        let body = json!({
            "result": {
                "addressMatches": [
                    {"coordinates": {"x": -76.61, "y": 39.29}}
                ]
            }
        });
        let point = parse_single_response(&body).unwrap().unwrap();
        assert!((point.longitude - (-76.61)).abs() < f64::EPSILON);
        assert!((point.latitude - 39.29).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_single_no_match() {
        let body = json!({"result": {"addressMatches": []}});
        assert!(parse_single_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_addressmatches() {
        let body = json!({"result": {}});
        assert!(parse_single_response(&body).is_err());
    }
}
