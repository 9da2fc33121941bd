//! Great-circle distance over partner locations.

use super::domain::{Coordinates, Partner};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

impl Coordinates {
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoordinateError::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoordinateError::Longitude(self.longitude));
        }
        Ok(())
    }
}

/// Haversine distance in kilometers. Never NaN for valid inputs.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // rounding can push `a` just past 1.0 for antipodes or just below 0.0 near zero
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// A partner paired with its distance from the query origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<'a> {
    pub partner: &'a Partner,
    pub distance_km: f64,
}

/// Query-scoped index over the partners that have been geocoded.
pub struct GeoIndex<'a> {
    entries: Vec<(&'a Partner, Coordinates)>,
}

impl<'a> GeoIndex<'a> {
    /// Partners without coordinates are skipped silently.
    pub fn build<I>(partners: I) -> Self
    where
        I: IntoIterator<Item = &'a Partner>,
    {
        let entries = partners
            .into_iter()
            .filter_map(|partner| partner.coordinates.map(|point| (partner, point)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn distances_from(&self, origin: Coordinates) -> Vec<Located<'a>> {
        self.entries
            .iter()
            .map(|(partner, point)| Located {
                partner,
                distance_km: haversine_km(origin, *point),
            })
            .collect()
    }

    /// Partners within `radius_km` (inclusive). A non-positive radius matches nothing.
    pub fn within(&self, origin: Coordinates, radius_km: f64) -> Vec<Located<'a>> {
        if radius_km <= 0.0 || radius_km.is_nan() {
            return Vec::new();
        }
        self.distances_from(origin)
            .into_iter()
            .filter(|located| located.distance_km <= radius_km)
            .collect()
    }
}
