use crate::clusterer::{ClusterModel, Metric};
use crate::error::{EngineError, Result};
use crate::preprocess::{FeaturePipeline, NormalizationParams};
use crate::search::{assign_with_model, cluster_ids};
use crate::table::{Column, FeatureTable, CLUSTER_ID};
use tracing::{error, info};

/// Attach the model's training labels to the featurized training table
pub fn assign_labels(features: &FeatureTable, model: &ClusterModel) -> Result<FeatureTable> {
    if features.n_rows() != model.labels().len() {
        return Err(EngineError::ModelMismatch(format!(
            "table has {} rows, model labeled {}",
            features.n_rows(),
            model.labels().len()
        )));
    }
    with_labels(features, model.labels())
}

/// Label songs the model has never seen
///
/// Cleans `raw` the same way the catalog was cleaned, scales it with the
/// catalog's params (never refit), then assigns each row to its closest
/// centroid under `metric`.
pub fn assign_new_labels(
    raw: &FeatureTable,
    params: &NormalizationParams,
    model: &ClusterModel,
    pipeline: &FeaturePipeline,
    metric: Metric,
) -> Result<FeatureTable> {
    if raw.is_empty() {
        error!("No song provided");
        return Err(EngineError::invalid("no song provided"));
    }

    let scaled = pipeline.prepare_query(raw, params)?;
    let ids = assign_with_model(&scaled, model, &pipeline.features, metric)?;
    info!(songs = ids.len(), "Assigned clusters to new songs");
    with_labels(&scaled, &ids)
}

/// Label every row of a scaled table with its nearest centroid, the rule
/// training used. The table may hold songs the model never saw.
pub fn label_with_model(scaled: &FeatureTable, model: &ClusterModel) -> Result<FeatureTable> {
    let points = scaled.matrix(model.features())?;
    with_labels(scaled, &model.predict(&points)?)
}

fn with_labels(table: &FeatureTable, labels: &[u32]) -> Result<FeatureTable> {
    let mut out = table.without_column(CLUSTER_ID);
    out.push_column(
        CLUSTER_ID,
        Column::Integer(labels.iter().map(|&l| l as i64).collect()),
    )?;
    Ok(out)
}

/// A table whose `clusterId` values all belong to one model
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledCatalog {
    table: FeatureTable,
    k: usize,
}

impl LabeledCatalog {
    pub fn new(table: FeatureTable, model: &ClusterModel) -> Result<Self> {
        if !table.has_column(CLUSTER_ID) {
            return Err(EngineError::missing(CLUSTER_ID));
        }
        if let Some(bad) = cluster_ids(&table)?.into_iter().find(|&id| !model.has_cluster(id)) {
            return Err(EngineError::ModelMismatch(format!(
                "cluster {} is not a centroid of a {}-cluster model",
                bad,
                model.k()
            )));
        }
        Ok(Self {
            table,
            k: model.k(),
        })
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Cluster count of the model that produced the labels
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn labels(&self) -> Result<Vec<u32>> {
        cluster_ids(&self.table)
    }
}
