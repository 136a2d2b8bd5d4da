use crate::clusterer::euclidean;
use crate::error::{EngineError, Result};
use crate::table::Matrix;
use std::collections::BTreeMap;

/// Mean silhouette coefficient over all rows, Euclidean distance
///
/// For row i with mean intra-cluster distance a and smallest mean distance
/// to another cluster b, s(i) = (b - a) / max(a, b). Undefined, and an
/// error, with fewer than 2 clusters or any cluster under 2 rows.
pub fn silhouette_score(points: &Matrix, labels: &[u32]) -> Result<f64> {
    let n = points.n_rows();
    if labels.len() != n {
        return Err(EngineError::invalid(format!(
            "{} labels for {} rows",
            labels.len(),
            n
        )));
    }

    let mut sizes: BTreeMap<u32, usize> = BTreeMap::new();
    for &l in labels {
        *sizes.entry(l).or_default() += 1;
    }
    if sizes.len() < 2 {
        return Err(EngineError::invalid(format!(
            "silhouette needs at least 2 clusters, found {}",
            sizes.len()
        )));
    }
    if let Some((id, size)) = sizes.iter().find(|&(_, &s)| s < 2) {
        return Err(EngineError::invalid(format!(
            "silhouette needs at least 2 rows per cluster, cluster {} has {}",
            id, size
        )));
    }

    // dense slot per label so per-row sums fit in a flat Vec
    let slot: BTreeMap<u32, usize> = sizes.keys().enumerate().map(|(i, &l)| (l, i)).collect();
    let counts: Vec<f64> = sizes.values().map(|&s| s as f64).collect();
    let slots: Vec<usize> = labels.iter().map(|l| slot[l]).collect();

    let mut total = 0.0;
    let mut sums = vec![0.0; counts.len()];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        let row = points.row(i);
        for j in 0..n {
            if i != j {
                sums[slots[j]] += euclidean(row, points.row(j));
            }
        }

        let own = slots[i];
        let a = sums[own] / (counts[own] - 1.0);
        let b = (0..counts.len())
            .filter(|&c| c != own)
            .map(|c| sums[c] / counts[c])
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Ok(total / n as f64)
}
