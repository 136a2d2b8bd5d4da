use crate::error::{EngineError, Result};
use crate::table::{Column, FeatureTable, FeatureVector, Matrix, CLUSTER_ID};
use serde::{Deserialize, Serialize};

/// Knobs for one k-means fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub seed: u64,
    pub max_iters: usize,
    /// Restarts; the lowest-inertia run wins
    pub n_init: usize,
    /// Convergence threshold on centroid movement, relative to the mean
    /// feature variance
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iters: 300,
            n_init: 10,
            tolerance: 1e-4,
        }
    }
}

impl KMeansConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Raw output of one k-means fit, indexed by position
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

/// Representative point of one cluster, aligned with the model's features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub id: u32,
    pub values: Vec<f64>,
}

/// Members of one cluster, by training row index
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: u32,
    pub members: Vec<usize>,
    pub centroid: Vec<f64>,
}

/// A trained partition: centroids, the ordered features they live in, and
/// the labels given to the training rows
///
/// Never mutated after training; retraining produces a new model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    features: Vec<String>,
    centroids: Vec<Centroid>,
    labels: Vec<u32>,
    inertia: f64,
    iterations: usize,
    seed: u64,
}

impl ClusterModel {
    pub(crate) fn from_fit(features: Vec<String>, fit: KMeansFit, seed: u64) -> Self {
        Self {
            features,
            centroids: fit
                .centroids
                .into_iter()
                .enumerate()
                .map(|(id, values)| Centroid {
                    id: id as u32,
                    values,
                })
                .collect(),
            labels: fit.labels.into_iter().map(|l| l as u32).collect(),
            inertia: fit.inertia,
            iterations: fit.iterations,
            seed,
        }
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Labels of the training rows, in training order
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Sum of squared distances from each training row to its centroid
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn has_cluster(&self, id: u32) -> bool {
        (id as usize) < self.centroids.len()
    }

    pub fn centroid(&self, id: u32) -> Option<&Centroid> {
        self.centroids.get(id as usize)
    }

    pub fn centroid_vector(&self, id: u32) -> Option<FeatureVector> {
        self.centroid(id).map(|c| {
            self.features
                .iter()
                .cloned()
                .zip(c.values.iter().copied())
                .collect()
        })
    }

    /// Centroids as a table: `clusterId` followed by one column per feature
    pub fn centroid_table(&self) -> Result<FeatureTable> {
        let mut table = FeatureTable::new();
        table.push_column(
            CLUSTER_ID,
            Column::Integer(self.centroids.iter().map(|c| c.id as i64).collect()),
        )?;
        for (j, name) in self.features.iter().enumerate() {
            table.push_column(
                name.clone(),
                Column::Float(self.centroids.iter().map(|c| c.values[j]).collect()),
            )?;
        }
        Ok(table)
    }

    pub fn clusters(&self) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = self
            .centroids
            .iter()
            .map(|c| Cluster {
                id: c.id,
                members: vec![],
                centroid: c.values.clone(),
            })
            .collect();

        for (row, &label) in self.labels.iter().enumerate() {
            clusters[label as usize].members.push(row);
        }
        clusters
    }

    /// Nearest centroid (squared Euclidean, the training objective) for
    /// each row of `points`, whose columns must follow `features()`
    pub fn predict(&self, points: &Matrix) -> Result<Vec<u32>> {
        if points.n_cols() != self.features.len() {
            return Err(EngineError::ModelMismatch(format!(
                "model has {} features, rows have {}",
                self.features.len(),
                points.n_cols()
            )));
        }
        let centers: Vec<Vec<f64>> = self.centroids.iter().map(|c| c.values.clone()).collect();
        Ok(points
            .rows()
            .map(|row| super::kmeans::nearest(row, &centers) as u32)
            .collect())
    }

    /// Check the structural invariants, e.g. after loading from storage
    pub fn validate(&self) -> Result<()> {
        if self.centroids.is_empty() {
            return Err(EngineError::invalid("model has no centroids"));
        }
        for (i, c) in self.centroids.iter().enumerate() {
            if c.id as usize != i {
                return Err(EngineError::invalid(format!(
                    "centroid ids must be dense 0..k-1, found {} at position {}",
                    c.id, i
                )));
            }
            if c.values.len() != self.features.len() {
                return Err(EngineError::ModelMismatch(format!(
                    "centroid {} has {} values for {} features",
                    c.id,
                    c.values.len(),
                    self.features.len()
                )));
            }
        }
        if let Some(bad) = self.labels.iter().find(|&&l| !self.has_cluster(l)) {
            return Err(EngineError::invalid(format!(
                "training label {} has no centroid",
                bad
            )));
        }
        Ok(())
    }
}
