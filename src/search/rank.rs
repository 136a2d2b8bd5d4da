use super::{cluster_ids, require_features};
use crate::clusterer::Metric;
use crate::error::{EngineError, Result};
use crate::table::{FeatureTable, FeatureVector, Record, CLUSTER_ID};
use std::cmp::Ordering;

/// One catalog row picked by `top_n`
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSong {
    /// Row index in the candidate pool
    pub row: usize,
    pub score: f64,
    pub record: Record,
}

/// The `n` pool rows in `cluster_id` closest to the single query row
///
/// Returns `min(n, cluster size)` rows, closest first. The partial
/// selection keeps the later pool row when two scores tie exactly; the
/// returned list orders equal scores by pool position.
pub fn top_n(
    query: &FeatureTable,
    pool: &FeatureTable,
    features: &[String],
    n: usize,
    cluster_id: u32,
    metric: Metric,
) -> Result<Vec<RankedSong>> {
    if features.is_empty() {
        return Err(EngineError::invalid("no features given for ranking"));
    }
    require_features(query, features)?;
    require_features(pool, features)?;
    if !pool.has_column(CLUSTER_ID) {
        return Err(EngineError::missing(CLUSTER_ID));
    }
    if query.n_rows() != 1 {
        return Err(EngineError::invalid(format!(
            "ranking takes exactly one query song, got {}",
            query.n_rows()
        )));
    }

    let labels = cluster_ids(pool)?;
    let q = query.matrix(features)?;
    let candidates = pool.matrix(features)?;
    let q = q.row(0);

    let mut scored: Vec<(usize, f64)> = labels
        .iter()
        .enumerate()
        .filter(|&(_, &l)| l == cluster_id)
        .map(|(row, _)| (row, metric.score(q, candidates.row(row))))
        .collect();

    if n == 0 {
        return Ok(vec![]);
    }
    if n < scored.len() {
        scored.select_nth_unstable_by(n - 1, selection_order);
        scored.truncate(n);
    }
    scored.sort_by(output_order);

    Ok(scored
        .into_iter()
        .map(|(row, score)| RankedSong {
            row,
            score,
            record: pool.record(row),
        })
        .collect())
}

pub fn top_n_for_vector(
    query: &FeatureVector,
    pool: &FeatureTable,
    features: &[String],
    n: usize,
    cluster_id: u32,
    metric: Metric,
) -> Result<Vec<RankedSong>> {
    top_n(&query.to_table(), pool, features, n, cluster_id, metric)
}

fn selection_order(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    Metric::closer_first(a.1, b.1).then(b.0.cmp(&a.0))
}

fn output_order(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    Metric::closer_first(a.1, b.1).then(a.0.cmp(&b.0))
}
