// Public API exports
pub mod clusterer;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluate;
pub mod lookup;
pub mod modelpack;
pub mod preprocess;
pub mod recommend;
pub mod search;
pub mod table;
pub mod workflow;

// Re-export main types for convenience
pub use error::{EngineError, Result};

pub use table::{Catalog, Column, FeatureTable, FeatureVector, Record, Song, Value, CLUSTER_ID};

pub use preprocess::{clean, featurize, FeaturePipeline, MissingFeaturePolicy, NormalizationParams};

pub use clusterer::{fit, fit_many, kmeans, ClusterModel, Diagnostics, KMeansConfig, Metric};

pub use search::{assign_cluster, assign_clusters, top_n, RankedSong};

pub use evaluate::{assign_labels, assign_new_labels, label_with_model, score, LabeledCatalog};

pub use config::Config;
pub use db::{DuplicateSong, SongStore};
pub use lookup::{FeatureLookup, HttpFeatureLookup, LookupError, LookupOutcome, TrackFeatures};
pub use modelpack::{ModelPack, ModelPackReader, ModelPackWriter, ModelStore};
pub use recommend::{Recommendation, RecommendedSong, Recommender};
pub use workflow::{evaluate_version, select_k, train_catalog, TrainReport};
