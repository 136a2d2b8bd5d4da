//! TOML configuration with compiled defaults for every field

use crate::clusterer::{KMeansConfig, Metric};
use crate::preprocess::{FeaturePipeline, MissingFeaturePolicy};
use crate::table::SONG_FEATURES;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Audio features used for distances unless configured otherwise
pub const DEFAULT_FEATURES: [&str; 9] = [
    "danceability",
    "energy",
    "loudness",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub model_dir: PathBuf,
    /// Columns used for clustering and similarity
    pub features: Vec<String>,
    /// Columns kept by cleaning, before scaling
    pub clean_features: Vec<String>,
    /// Raw column -> catalog column renames, applied in order
    pub col_mapper: IndexMap<String, String>,
    pub metric: Metric,
    pub on_missing_feature: MissingFeaturePolicy,
    pub top_n: usize,
    pub max_rows_show: usize,
    pub training: TrainingConfig,
    pub lookup: LookupConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut clean_features = vec!["title".to_string(), "track_uri".to_string()];
        clean_features.extend(SONG_FEATURES.iter().map(|f| f.to_string()));

        let col_mapper = [("uri", "track_uri"), ("duration_ms", "duration"), ("name", "title")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            database_path: PathBuf::from("data/anisong.db"),
            model_dir: PathBuf::from("models"),
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
            clean_features,
            col_mapper,
            metric: Metric::default(),
            on_missing_feature: MissingFeaturePolicy::default(),
            top_n: 10,
            max_rows_show: 10,
            training: TrainingConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub k: usize,
    /// Inclusive range scanned by model selection
    pub k_min: usize,
    pub k_max: usize,
    pub seed: u64,
    pub max_iters: usize,
    pub n_init: usize,
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let kmeans = KMeansConfig::default();
        Self {
            k: 6,
            k_min: 2,
            k_max: 12,
            seed: kmeans.seed,
            max_iters: kmeans.max_iters,
            n_init: kmeans.n_init,
            tolerance: kmeans.tolerance,
        }
    }
}

impl TrainingConfig {
    pub fn kmeans(&self) -> KMeansConfig {
        KMeansConfig {
            seed: self.seed,
            max_iters: self.max_iters,
            n_init: self.n_init,
            tolerance: self.tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub endpoint: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.spotify.com/v1".to_string(),
            token_env: "SPOTIFY_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .context(format!("Invalid config file {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` when given, otherwise the compiled defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                info!("No config file given; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            bail!("features must not be empty");
        }
        if self.training.k == 0 {
            bail!("training.k must be at least 1");
        }
        if self.training.k_min == 0 || self.training.k_min > self.training.k_max {
            bail!(
                "training k range {}..={} is empty",
                self.training.k_min,
                self.training.k_max
            );
        }
        if self.training.tolerance.is_nan() || self.training.tolerance < 0.0 {
            bail!("training.tolerance must be non-negative");
        }
        Ok(())
    }

    pub fn pipeline(&self) -> FeaturePipeline {
        FeaturePipeline {
            col_mapper: self.col_mapper.clone(),
            clean_features: self.clean_features.clone(),
            features: self.features.clone(),
            on_missing_feature: self.on_missing_feature,
        }
    }
}
