use crate::clusterer::{
    centroid::update_centroids,
    similarity::squared_euclidean,
    types::{KMeansConfig, KMeansFit},
};
use crate::error::{EngineError, Result};
use crate::table::Matrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Lloyd's k-means over the rows of `points`
///
/// Seeded with k-means++, restarted `n_init` times from one ChaCha stream,
/// best inertia kept. The same points, k and config always give the same
/// centroids and labels. Every id in `0..k` labels at least one row.
pub fn kmeans(points: &Matrix, k: usize, config: &KMeansConfig) -> Result<KMeansFit> {
    let n = points.n_rows();
    if n == 0 {
        return Err(EngineError::invalid("cannot cluster an empty dataset"));
    }
    if points.n_cols() == 0 {
        return Err(EngineError::invalid("cannot cluster rows with no features"));
    }
    if k == 0 {
        return Err(EngineError::invalid("k must be at least 1"));
    }
    if k > n {
        return Err(EngineError::invalid(format!(
            "k ({}) cannot exceed number of rows ({})",
            k, n
        )));
    }
    if !points.is_finite() {
        return Err(EngineError::invalid("training data contains non-finite values"));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tolerance = config.tolerance * points.mean_variance();

    let mut best: Option<KMeansFit> = None;
    for run in 0..config.n_init.max(1) {
        let fit = single_run(points, k, config.max_iters, tolerance, &mut rng);
        debug!(run, inertia = fit.inertia, iterations = fit.iterations, "k-means run");

        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    best.ok_or_else(|| EngineError::invalid("no k-means run completed"))
}

fn single_run(
    points: &Matrix,
    k: usize,
    max_iters: usize,
    tolerance: f64,
    rng: &mut ChaCha8Rng,
) -> KMeansFit {
    // 1. k-means++ initial centers
    let mut centroids = plus_plus_init(points, k, rng);
    let mut labels = assign_nearest(points, &centroids);
    let mut iterations = 0;

    for _ in 0..max_iters {
        iterations += 1;

        // 2. Keep every cluster populated, then move centers to member means
        fill_empty_clusters(points, &mut labels, &centroids);
        let updated = update_centroids(points, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_euclidean(a, b))
            .sum();
        centroids = updated;

        // 3. Reassign
        let next = assign_nearest(points, &centroids);
        let changed = next != labels;
        labels = next;

        if !changed || shift <= tolerance {
            break; // converged
        }
    }

    // 4. Final labels must cover all k ids
    if fill_empty_clusters(points, &mut labels, &centroids) {
        centroids = update_centroids(points, &labels, &centroids);
    }

    let inertia = points
        .rows()
        .zip(&labels)
        .map(|(row, &c)| squared_euclidean(row, &centroids[c]))
        .sum();

    KMeansFit {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

/// Index of the nearest centroid by squared distance, lowest index on ties
pub(crate) fn nearest(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, center) in centroids.iter().enumerate() {
        let d = squared_euclidean(row, center);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

fn assign_nearest(points: &Matrix, centroids: &[Vec<f64>]) -> Vec<usize> {
    points.rows().map(|row| nearest(row, centroids)).collect()
}

fn plus_plus_init(points: &Matrix, k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = points.n_rows();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points.row(rng.gen_range(0..n)).to_vec());

    let mut dist: Vec<f64> = points
        .rows()
        .map(|row| squared_euclidean(row, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let idx = if total > 0.0 {
            // sample proportional to squared distance from the nearest center
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut picked = n - 1;
            for (i, d) in dist.iter().enumerate() {
                acc += d;
                if acc > target {
                    picked = i;
                    break;
                }
            }
            picked
        } else {
            rng.gen_range(0..n)
        };

        let center = points.row(idx).to_vec();
        for (i, row) in points.rows().enumerate() {
            dist[i] = dist[i].min(squared_euclidean(row, &center));
        }
        centroids.push(center);
    }

    centroids
}

/// Move the row farthest from its centroid into each empty cluster. Rows are
/// only taken from clusters with more than one member, so with `k <= n` every
/// cluster ends up non-empty. Returns whether anything moved.
fn fill_empty_clusters(points: &Matrix, labels: &mut [usize], centroids: &[Vec<f64>]) -> bool {
    let k = centroids.len();
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }

    let mut moved = false;
    for c in 0..k {
        if counts[c] > 0 {
            continue;
        }

        let mut donor: Option<(usize, f64)> = None;
        for (i, row) in points.rows().enumerate() {
            let from = labels[i];
            if counts[from] < 2 {
                continue;
            }
            let d = squared_euclidean(row, &centroids[from]);
            if donor.map_or(true, |(_, best)| d > best) {
                donor = Some((i, d));
            }
        }

        if let Some((i, _)) = donor {
            counts[labels[i]] -= 1;
            labels[i] = c;
            counts[c] = 1;
            moved = true;
        }
    }
    moved
}
