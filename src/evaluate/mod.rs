mod labels;
mod silhouette;

#[cfg(test)]
mod tests;

pub use labels::{assign_labels, assign_new_labels, label_with_model, LabeledCatalog};
pub use silhouette::silhouette_score;

use crate::error::{EngineError, Result};
use crate::search::cluster_ids;
use crate::table::{FeatureTable, CLUSTER_ID};
use tracing::{error, info};

/// Silhouette score of a labeled table
///
/// Uses every column except `clusterId`; all of them must be numeric.
/// No sampling, so the same table always scores the same.
pub fn score(labeled: &FeatureTable) -> Result<f64> {
    if !labeled.has_column(CLUSTER_ID) {
        error!("Needs a {} label column to score", CLUSTER_ID);
        return Err(EngineError::missing(CLUSTER_ID));
    }

    let features: Vec<String> = labeled
        .column_names()
        .iter()
        .filter(|n| n.as_str() != CLUSTER_ID)
        .cloned()
        .collect();
    if features.is_empty() {
        return Err(EngineError::invalid("no feature columns besides the label"));
    }

    let points = labeled.matrix(&features)?;
    let labels = cluster_ids(labeled)?;
    let value = silhouette_score(&points, &labels)?;
    info!(score = value, rows = labeled.n_rows(), "Silhouette score");
    Ok(value)
}

pub fn score_catalog(catalog: &LabeledCatalog) -> Result<f64> {
    score(catalog.table())
}
