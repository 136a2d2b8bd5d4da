use super::kmeans::kmeans;
use super::types::{ClusterModel, KMeansConfig};
use crate::error::{EngineError, Result};
use crate::evaluate::silhouette_score;
use crate::preprocess::{validate_features, MissingFeaturePolicy};
use crate::table::{FeatureTable, CLUSTER_ID};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Numeric training matrix source for the given columns
///
/// All of `cols` present: keep them, narrowed to the numeric ones (logged).
/// Some absent: under `FallbackToAll` use every numeric column of `df`
/// except `clusterId` (logged), under `Error` fail with `MissingFeature`.
pub fn get_train_data(
    df: &FeatureTable,
    cols: &[String],
    policy: MissingFeaturePolicy,
) -> Result<FeatureTable> {
    let data = if validate_features(df, cols) {
        let selected = df.select(cols)?;
        let numeric = selected.numeric_subset();
        if numeric.n_cols() < cols.len() {
            warn!(
                chosen = ?numeric.column_names(),
                "Not all given columns are numeric; clustering uses the numeric subset"
            );
        } else {
            info!("All the given columns are used in clustering");
        }
        numeric
    } else {
        let missing = df.missing_features(cols);
        match policy {
            MissingFeaturePolicy::Error => {
                return Err(match missing.first() {
                    Some(name) => EngineError::missing(*name),
                    None => EngineError::invalid("no training features requested"),
                })
            }
            MissingFeaturePolicy::FallbackToAll => {
                let numeric = df.without_column(CLUSTER_ID).numeric_subset();
                warn!(
                    missing = ?missing,
                    chosen = ?numeric.column_names(),
                    "Given features do not exist in the table; using all numeric columns"
                );
                numeric
            }
        }
    };

    if data.n_cols() == 0 {
        return Err(EngineError::invalid("no numeric columns to train on"));
    }
    Ok(data)
}

/// Fit one k-means model on `cols` of `df`
pub fn fit(
    df: &FeatureTable,
    cols: &[String],
    k: usize,
    config: &KMeansConfig,
    policy: MissingFeaturePolicy,
) -> Result<ClusterModel> {
    let data = get_train_data(df, cols, policy)?;
    let features = data.column_names().to_vec();
    let points = data.matrix(&features)?;

    let result = kmeans(&points, k, config)?;
    info!(
        k,
        inertia = result.inertia,
        iterations = result.iterations,
        "Fitted k-means model"
    );
    Ok(ClusterModel::from_fit(features, result, config.seed))
}

/// One independent model per k, for model selection
pub fn fit_many(
    df: &FeatureTable,
    cols: &[String],
    k_range: impl IntoIterator<Item = usize>,
    config: &KMeansConfig,
    policy: MissingFeaturePolicy,
) -> Result<BTreeMap<usize, ClusterModel>> {
    let mut models = BTreeMap::new();
    for k in k_range {
        models.insert(k, fit(df, cols, k, config, policy)?);
    }
    if models.is_empty() {
        return Err(EngineError::invalid("empty k range"));
    }
    Ok(models)
}

/// Elbow and silhouette numbers for one model
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub k: usize,
    pub inertia: f64,
    /// `Err` explains why the score is undefined for this model
    pub silhouette: Result<f64>,
    pub cluster_sizes: Vec<usize>,
}

/// Diagnose `model` against the table it was trained on
pub fn diagnose(df: &FeatureTable, model: &ClusterModel) -> Result<Diagnostics> {
    if !df.contains_all(model.features()) {
        return Err(EngineError::ModelMismatch(format!(
            "table lacks model features {:?}",
            df.missing_features(model.features())
        )));
    }
    if df.n_rows() != model.labels().len() {
        return Err(EngineError::ModelMismatch(format!(
            "table has {} rows, model was trained on {}",
            df.n_rows(),
            model.labels().len()
        )));
    }

    let points = df.matrix(model.features())?;
    Ok(Diagnostics {
        k: model.k(),
        inertia: model.inertia(),
        silhouette: silhouette_score(&points, model.labels()),
        cluster_sizes: model.clusters().iter().map(|c| c.members.len()).collect(),
    })
}

pub fn diagnose_many(
    df: &FeatureTable,
    models: &BTreeMap<usize, ClusterModel>,
) -> Result<Vec<Diagnostics>> {
    models.values().map(|m| diagnose(df, m)).collect()
}
