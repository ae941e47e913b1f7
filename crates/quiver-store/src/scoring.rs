//! Similarity scoring shared by the store backends.
//!
//! Scores are normalized to `[0, 1]` with 1.0 meaning identical, matching
//! the score conventions of managed vector search services: cosine and dot
//! product map through `(1 + s) / 2`, euclidean through `1 / (1 + d)`.
//! Dot product only stays within range for unit-normalized vectors, which
//! is what embedding providers produce.

use quiver_core::types::DistanceMetric;

/// Score a candidate vector against a query vector under the given metric.
///
/// Returns 0.0 for mismatched dimensions, empty vectors, or a zero-magnitude
/// operand under the cosine metric.
pub fn similarity_score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f64 {
    if query.len() != candidate.len() || query.is_empty() {
        return 0.0;
    }

    match metric {
        DistanceMetric::Cosine => {
            let mag_q = magnitude(query);
            let mag_c = magnitude(candidate);
            if mag_q == 0.0 || mag_c == 0.0 {
                return 0.0;
            }
            (1.0 + dot_product(query, candidate) / (mag_q * mag_c)) / 2.0
        }
        DistanceMetric::DotProduct => (1.0 + dot_product(query, candidate)) / 2.0,
        DistanceMetric::Euclidean => 1.0 / (1.0 + euclidean_distance(query, candidate)),
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

fn magnitude(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x as f64) - (*y as f64)).powi(2))
        .sum::<f64>()
        .sqrt()
}
