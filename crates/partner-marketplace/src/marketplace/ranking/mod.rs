mod query;
mod scoring;

pub use query::{SearchQuery, SortKey};
pub use scoring::RelevanceWeights;

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::domain::{Partner, PartnerService, TenantPartnerRelation};
use super::geo::{CoordinateError, GeoIndex};
use super::repository::{PartnerRepository, RepositoryError};
use scoring::{relevance_scores, RelevanceSignals};

const MAX_RATING: f64 = 5.0;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search origin: {0}")]
    InvalidOrigin(#[from] CoordinateError),
    #[error("invalid search query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPartner {
    pub partner: Partner,
    pub distance_km: f64,
    /// Cheapest active service matching the query's service filter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<TenantPartnerRelation>,
}

/// Stateless ranker; reads partner status at query time and never caches visibility.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    weights: RelevanceWeights,
}

impl RankingEngine {
    pub fn new(weights: RelevanceWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RelevanceWeights {
        &self.weights
    }

    pub fn search<R>(
        &self,
        repository: &R,
        query: &SearchQuery,
    ) -> Result<Vec<RankedPartner>, SearchError>
    where
        R: PartnerRepository + ?Sized,
    {
        query.origin().validate()?;
        if query.radius_km.is_nan() {
            return Err(SearchError::InvalidQuery("radius_km must be a number".to_string()));
        }
        if query.min_rating.is_some_and(f64::is_nan) {
            return Err(SearchError::InvalidQuery("min_rating must be a number".to_string()));
        }

        if query.radius_km <= 0.0 || query.min_rating.is_some_and(|min| min > MAX_RATING) {
            return Ok(Vec::new());
        }

        let partners = repository.partners()?;
        let eligible = partners.iter().filter(|partner| {
            partner.is_bookable()
                && query
                    .partner_type
                    .map_or(true, |wanted| partner.partner_type == wanted)
                && query.min_rating.map_or(true, |min| partner.rating >= min)
        });

        let index = GeoIndex::build(eligible);
        let located = index.within(query.origin(), query.radius_km);

        let mut hits = Vec::with_capacity(located.len());
        for entry in located {
            let services = repository.services_for(&entry.partner.id)?;
            hits.push(RankedPartner {
                partner: entry.partner.clone(),
                distance_km: entry.distance_km,
                min_price: cheapest(&services, query.service.as_deref()),
                relevance: None,
                relation: None,
            });
        }

        self.order(&mut hits, query.sort_by);
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }

        debug!(
            candidates = index.len(),
            results = hits.len(),
            sort_by = ?query.sort_by,
            "partner search ranked"
        );
        Ok(hits)
    }

    fn order(&self, hits: &mut [RankedPartner], sort_by: SortKey) {
        match sort_by {
            SortKey::Distance => hits.sort_by(|a, b| {
                a.distance_km
                    .total_cmp(&b.distance_km)
                    .then_with(|| by_id(a, b))
            }),
            SortKey::Rating => hits.sort_by(|a, b| {
                b.partner
                    .rating
                    .total_cmp(&a.partner.rating)
                    .then_with(|| b.partner.total_reviews.cmp(&a.partner.total_reviews))
                    .then_with(|| by_id(a, b))
            }),
            SortKey::Price => hits.sort_by(|a, b| {
                match (a.min_price, b.min_price) {
                    (Some(left), Some(right)) => left.cmp(&right),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
                .then_with(|| by_id(a, b))
            }),
            SortKey::Relevance => {
                let signals: Vec<RelevanceSignals> = hits
                    .iter()
                    .map(|hit| RelevanceSignals {
                        rating: hit.partner.rating,
                        distance_km: hit.distance_km,
                        total_reviews: hit.partner.total_reviews,
                    })
                    .collect();
                let scores = relevance_scores(&signals, &self.weights);
                for (hit, score) in hits.iter_mut().zip(scores) {
                    hit.relevance = Some(score);
                }
                hits.sort_by(|a, b| {
                    b.relevance
                        .unwrap_or_default()
                        .total_cmp(&a.relevance.unwrap_or_default())
                        .then_with(|| by_id(a, b))
                });
            }
        }
    }
}

fn by_id(a: &RankedPartner, b: &RankedPartner) -> Ordering {
    a.partner.id.cmp(&b.partner.id)
}

fn cheapest(services: &[PartnerService], wanted: Option<&str>) -> Option<Decimal> {
    services
        .iter()
        .filter(|service| service.is_available())
        .filter(|service| wanted.map_or(true, |name| service.matches_name(name)))
        .map(|service| service.price)
        .min()
}
