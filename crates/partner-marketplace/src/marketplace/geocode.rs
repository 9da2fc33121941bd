//! Address lookup boundary. Runs before a search, never inside ranking.

use std::collections::HashMap;

use super::domain::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    #[error("no coordinates found for address '{0}'")]
    NotFound(String),
    #[error("geocoding provider unavailable: {0}")]
    Unavailable(String),
}

/// Resolves free-text addresses to coordinates.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// Fixed lookup table, keyed by normalized address text.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    entries: HashMap<String, Coordinates>,
}

fn normalize(address: &str) -> String {
    address
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, address: &str, coordinates: Coordinates) -> Self {
        self.entries.insert(normalize(address), coordinates);
        self
    }
}

impl Geocoder for StaticGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        self.entries
            .get(&normalize(address))
            .copied()
            .ok_or_else(|| GeocodeError::NotFound(address.to_string()))
    }
}
