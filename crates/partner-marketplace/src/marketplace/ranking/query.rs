use serde::{Deserialize, Serialize};

use super::super::domain::{Coordinates, PartnerType, TenantId};

/// Ordering applied to search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Distance,
    Rating,
    Price,
    #[default]
    Relevance,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "distance" => Some(Self::Distance),
            "rating" => Some(Self::Rating),
            "price" => Some(Self::Price),
            "relevance" => Some(Self::Relevance),
            _ => None,
        }
    }
}

/// Search request as received from a tenant. Flat so it maps onto a query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    #[serde(default, rename = "type")]
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub sort_by: SortKey,
    /// Case-insensitive service name used by the price ordering.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// When present every result carries the tenant's relation projection.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

impl SearchQuery {
    pub fn new(lat: f64, lon: f64, radius_km: f64) -> Self {
        Self {
            lat,
            lon,
            radius_km,
            partner_type: None,
            min_rating: None,
            sort_by: SortKey::default(),
            service: None,
            limit: None,
            tenant_id: None,
        }
    }

    pub fn at(origin: Coordinates, radius_km: f64) -> Self {
        Self::new(origin.latitude, origin.longitude, radius_km)
    }

    pub fn origin(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    pub fn sorted_by(mut self, sort_by: SortKey) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn of_type(mut self, partner_type: PartnerType) -> Self {
        self.partner_type = Some(partner_type);
        self
    }

    pub fn with_min_rating(mut self, min_rating: f64) -> Self {
        self.min_rating = Some(min_rating);
        self
    }

    pub fn for_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn for_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }
}
