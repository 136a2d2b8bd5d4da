mod centroid;
mod kmeans;
mod similarity;
mod train;
mod types;

#[cfg(test)]
mod tests;

pub use kmeans::kmeans;
pub use similarity::{cosine_distance, cosine_similarity, euclidean, squared_euclidean, Metric};
pub use train::{diagnose, diagnose_many, fit, fit_many, get_train_data, Diagnostics};
pub use types::{Centroid, Cluster, ClusterModel, KMeansConfig, KMeansFit};
