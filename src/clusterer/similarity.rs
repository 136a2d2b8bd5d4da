use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }

    dot / (na.sqrt() * nb.sqrt())
}

pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// How a query is compared against centroids and catalog songs
///
/// The two metrics can pick different clusters for the same data, so a
/// deployment fixes one in its config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Higher cosine similarity is closer
    #[default]
    Cosine,
    /// Smaller squared Euclidean distance is closer (scored as its negation)
    Euclidean,
}

impl Metric {
    /// Similarity score; larger always means closer
    pub fn score(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => -squared_euclidean(a, b),
        }
    }

    /// Ordering that puts the closer of two scores first
    pub fn closer_first(a: f64, b: f64) -> Ordering {
        b.total_cmp(&a)
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
