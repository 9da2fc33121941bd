use serde::{Deserialize, Serialize};

/// Floor applied before inverting distance so co-located partners stay finite.
const MIN_PROXIMITY_DISTANCE_KM: f64 = 0.01;

/// Weights of the composite relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceWeights {
    pub rating: f64,
    pub proximity: f64,
    pub reviews: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            rating: 0.5,
            proximity: 0.3,
            reviews: 0.2,
        }
    }
}

/// Inputs of one candidate to the relevance score.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RelevanceSignals {
    pub rating: f64,
    pub distance_km: f64,
    pub total_reviews: u32,
}

/// Min-max normalize over the current result set. A flat column normalizes to 1.0.
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|value| (value - min) / range).collect()
}

/// Relative scores for the given candidates, index-aligned with the input.
pub(crate) fn relevance_scores(
    candidates: &[RelevanceSignals],
    weights: &RelevanceWeights,
) -> Vec<f64> {
    let ratings: Vec<f64> = candidates.iter().map(|c| c.rating).collect();
    let proximity: Vec<f64> = candidates
        .iter()
        .map(|c| 1.0 / c.distance_km.max(MIN_PROXIMITY_DISTANCE_KM))
        .collect();
    let reviews: Vec<f64> = candidates
        .iter()
        .map(|c| f64::from(c.total_reviews))
        .collect();

    let ratings = normalize(&ratings);
    let proximity = normalize(&proximity);
    let reviews = normalize(&reviews);

    (0..candidates.len())
        .map(|index| {
            ratings[index] * weights.rating
                + proximity[index] * weights.proximity
                + reviews[index] * weights.reviews
        })
        .collect()
}
