use crate::table::Matrix;

pub fn compute_centroid(vectors: &[&[f64]]) -> Vec<f64> {
    let dim = vectors[0].len();
    let mut out = vec![0.0; dim];

    for v in vectors {
        for i in 0..dim {
            out[i] += v[i];
        }
    }

    let n = vectors.len() as f64;
    for x in out.iter_mut() {
        *x /= n;
    }

    out
}

/// Mean of the rows labeled `c`, for every `c` in `0..k`.
/// A cluster with no rows keeps its previous centroid.
pub fn update_centroids(
    points: &Matrix,
    labels: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    (0..previous.len())
        .map(|c| {
            let members: Vec<&[f64]> = points
                .rows()
                .zip(labels)
                .filter(|&(_, &l)| l == c)
                .map(|(row, _)| row)
                .collect();

            if members.is_empty() {
                previous[c].clone()
            } else {
                compute_centroid(&members)
            }
        })
        .collect()
}
