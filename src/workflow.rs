//! Catalog-level jobs: training, model selection and evaluation against
//! the song store

use crate::clusterer::{diagnose_many, fit, fit_many, Diagnostics};
use crate::config::Config;
use crate::db::SongStore;
use crate::evaluate::{assign_labels, label_with_model, score_catalog, LabeledCatalog};
use crate::modelpack::ModelStore;
use crate::preprocess::{featurize, NormalizationParams};
use crate::table::{Catalog, FeatureTable, Song, CLUSTER_ID};
use anyhow::{bail, Context, Result};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub version: String,
    pub k: usize,
    pub inertia: f64,
    pub iterations: usize,
    pub labeled: usize,
}

/// All stored songs and their table, without any stored labels
fn load_catalog(store: &SongStore) -> Result<(Vec<Song>, FeatureTable)> {
    let songs = store.get_all_songs()?;
    if songs.is_empty() {
        bail!("The song catalog is empty; ingest songs first");
    }
    let table = Catalog::new(songs.clone())
        .to_table()
        .context("Failed to tabulate catalog")?
        .without_column(CLUSTER_ID);
    Ok((songs, table))
}

/// Scale `table` with stored params, keep `features`, and carry its
/// `clusterId` column over unchanged
pub(crate) fn scaled_with_labels(
    table: &FeatureTable,
    params: &NormalizationParams,
    features: &[String],
) -> Result<FeatureTable> {
    let labels = table
        .column(CLUSTER_ID)
        .cloned()
        .context("Songs carry no cluster labels; train a model first")?;
    let mut scaled = params.transform(table)?.select(features)?;
    scaled.push_column(CLUSTER_ID, labels)?;
    Ok(scaled)
}

/// Fit a k-cluster model on the whole catalog, save it with its
/// normalization params as a new version, then store each song's label
pub fn train_catalog(
    store: &mut SongStore,
    models: &ModelStore,
    config: &Config,
    k: usize,
) -> Result<TrainReport> {
    let start = Instant::now();
    let (songs, table) = load_catalog(store)?;

    let (scaled, params) = featurize(&table, &config.features, config.on_missing_feature)?;
    let model = fit(
        &scaled,
        &config.features,
        k,
        &config.training.kmeans(),
        config.on_missing_feature,
    )?;

    let labeled = LabeledCatalog::new(assign_labels(&scaled, &model)?, &model)?;
    let labels: Vec<(String, u32)> = songs
        .iter()
        .map(|s| s.track_uri.clone())
        .zip(labeled.labels()?)
        .collect();

    let version = models.save(&model, &params, config.metric)?;
    let updated = store.set_cluster_ids(&version, &labels)?;
    info!(
        version = %version,
        k,
        songs = updated,
        elapsed_s = start.elapsed().as_secs_f64(),
        "Training complete"
    );

    Ok(TrainReport {
        version,
        k,
        inertia: model.inertia(),
        iterations: model.iterations(),
        labeled: updated,
    })
}

/// Inertia and silhouette for every k in `k_min..=k_max`
pub fn select_k(
    store: &SongStore,
    config: &Config,
    k_min: usize,
    k_max: usize,
) -> Result<Vec<Diagnostics>> {
    if k_min == 0 || k_min > k_max {
        bail!("Empty k range {}..={}", k_min, k_max);
    }
    let (songs, table) = load_catalog(store)?;
    if k_max > songs.len() {
        bail!("k_max {} exceeds the {} songs in the catalog", k_max, songs.len());
    }

    let (scaled, _) = featurize(&table, &config.features, config.on_missing_feature)?;
    let models = fit_many(
        &scaled,
        &config.features,
        k_min..=k_max,
        &config.training.kmeans(),
        config.on_missing_feature,
    )?;
    Ok(diagnose_many(&scaled, &models)?)
}

/// Silhouette score of the given model version (latest when `None`) over
/// the current catalog. Labels come from that model's centroids, never
/// from whichever training last labeled the store.
pub fn evaluate_version(
    store: &SongStore,
    models: &ModelStore,
    version: Option<&str>,
) -> Result<f64> {
    let pack = match version {
        Some(v) => models.load(v)?,
        None => models.latest()?,
    };
    let (_, table) = load_catalog(store)?;

    let scaled = pack.params.transform(&table)?.select(pack.model.features())?;
    let catalog = LabeledCatalog::new(label_with_model(&scaled, &pack.model)?, &pack.model)?;
    let score = score_catalog(&catalog)?;
    info!(version = %pack.manifest.version, score, "Evaluated model");
    Ok(score)
}
