use super::require_features;
use crate::clusterer::{ClusterModel, Metric};
use crate::error::{EngineError, Result};
use crate::table::{FeatureTable, FeatureVector, CLUSTER_ID};
use tracing::debug;

/// Closest centroid for every query row, in query row order
///
/// `features` must be columns of both tables; there is no fallback. The
/// centroid table carries its ids in a `clusterId` column. Exact score ties
/// go to the lowest cluster id.
pub fn assign_clusters(
    query: &FeatureTable,
    centroids: &FeatureTable,
    features: &[String],
    metric: Metric,
) -> Result<Vec<u32>> {
    if features.is_empty() {
        return Err(EngineError::invalid("no features given for cluster assignment"));
    }
    require_features(query, features)?;
    require_features(centroids, features)?;
    if !centroids.has_column(CLUSTER_ID) {
        return Err(EngineError::missing(CLUSTER_ID));
    }
    if query.is_empty() {
        return Err(EngineError::invalid("no song provided"));
    }
    if centroids.is_empty() {
        return Err(EngineError::invalid("no centroids provided"));
    }

    let ids = cluster_ids(centroids)?;
    let q = query.matrix(features)?;
    let c = centroids.matrix(features)?;
    if !q.is_finite() || !c.is_finite() {
        return Err(EngineError::invalid("non-finite feature values"));
    }

    let assigned = q
        .rows()
        .map(|row| {
            let mut best_id = ids[0];
            let mut best = metric.score(row, c.row(0));
            for (j, &id) in ids.iter().enumerate().skip(1) {
                let s = metric.score(row, c.row(j));
                if s > best || (s == best && id < best_id) {
                    best = s;
                    best_id = id;
                }
            }
            debug!(cluster = best_id, score = best, %metric, "assigned query row");
            best_id
        })
        .collect();

    Ok(assigned)
}

/// Closest centroid for a single song
pub fn assign_cluster(
    query: &FeatureVector,
    centroids: &FeatureTable,
    features: &[String],
    metric: Metric,
) -> Result<u32> {
    let ids = assign_clusters(&query.to_table(), centroids, features, metric)?;
    ids.first()
        .copied()
        .ok_or_else(|| EngineError::invalid("no song provided"))
}

/// Assign against a trained model's own centroids. `features` must be a
/// subset of what the model was trained on.
pub fn assign_with_model(
    query: &FeatureTable,
    model: &ClusterModel,
    features: &[String],
    metric: Metric,
) -> Result<Vec<u32>> {
    if let Some(f) = features.iter().find(|f| !model.features().contains(f)) {
        return Err(EngineError::ModelMismatch(format!(
            "feature '{}' is not one the model was trained on {:?}",
            f,
            model.features()
        )));
    }
    assign_clusters(query, &model.centroid_table()?, features, metric)
}

pub(crate) fn cluster_ids(table: &FeatureTable) -> Result<Vec<u32>> {
    table
        .numeric_column(CLUSTER_ID)?
        .into_iter()
        .map(|v| {
            if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
                Ok(v as u32)
            } else {
                Err(EngineError::invalid(format!("bad cluster id {}", v)))
            }
        })
        .collect()
}
