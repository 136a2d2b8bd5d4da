use crate::error::{EngineError, Result};
use crate::table::{Column, FeatureTable, FeatureVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-feature z-score parameters, fitted once on a reference catalog
///
/// Immutable after `fit`. Query vectors go through `transform` with the
/// same params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    features: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    n_samples: usize,
}

impl NormalizationParams {
    /// Fit mean and population standard deviation for every column of
    /// `numeric`. Constant columns get a scale of 1.
    pub fn fit(numeric: &FeatureTable) -> Result<Self> {
        let n = numeric.n_rows();
        if numeric.n_cols() > 0 && n == 0 {
            return Err(EngineError::invalid(
                "cannot fit normalization on a table with no rows",
            ));
        }
        if n == 1 {
            warn!("Normalization fitted on a single sample; every feature gets scale 1");
        }

        let mut features = Vec::with_capacity(numeric.n_cols());
        let mut mean = Vec::with_capacity(numeric.n_cols());
        let mut scale = Vec::with_capacity(numeric.n_cols());

        for name in numeric.column_names() {
            let values = numeric.numeric_column(name)?;
            if values.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::invalid(format!(
                    "column '{}' contains non-finite values",
                    name
                )));
            }

            let m = values.iter().sum::<f64>() / n as f64;
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
            let s = var.sqrt();

            features.push(name.clone());
            mean.push(m);
            scale.push(if s > 0.0 { s } else { 1.0 });
        }

        Ok(Self {
            features,
            mean,
            scale,
            n_samples: n,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn mean(&self, feature: &str) -> Option<f64> {
        self.index_of(feature).map(|i| self.mean[i])
    }

    pub fn scale(&self, feature: &str) -> Option<f64> {
        self.index_of(feature).map(|i| self.scale[i])
    }

    /// Check the per-feature vectors line up, e.g. after loading from storage
    pub fn validate(&self) -> Result<()> {
        let n = self.features.len();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(EngineError::invalid(format!(
                "normalization params have {} features, {} means and {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(i) = (0..n).find(|&i| !self.mean[i].is_finite()) {
            return Err(EngineError::invalid(format!(
                "non-finite mean for '{}'",
                self.features[i]
            )));
        }
        if let Some(i) = (0..n).find(|&i| !(self.scale[i].is_finite() && self.scale[i] > 0.0)) {
            return Err(EngineError::invalid(format!(
                "scale for '{}' must be positive",
                self.features[i]
            )));
        }
        Ok(())
    }

    fn index_of(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|f| f == feature)
    }

    /// `(x - mean) / scale` for every fitted feature, in fitted order.
    /// Columns of `table` the params do not know are dropped.
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        self.map_columns(table, |x, m, s| (x - m) / s)
    }

    pub fn inverse_transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        self.map_columns(table, |z, m, s| z * s + m)
    }

    pub fn transform_vector(&self, vector: &FeatureVector) -> Result<FeatureVector> {
        let values = vector.values_for(&self.features)?;
        Ok(self
            .features
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (name, x))| (name.clone(), (x - self.mean[i]) / self.scale[i]))
            .collect())
    }

    fn map_columns(
        &self,
        table: &FeatureTable,
        f: impl Fn(f64, f64, f64) -> f64,
    ) -> Result<FeatureTable> {
        let mut out = FeatureTable::new();
        for (i, name) in self.features.iter().enumerate() {
            let values = table.numeric_column(name)?;
            let mapped = values
                .into_iter()
                .map(|x| f(x, self.mean[i], self.scale[i]))
                .collect();
            out.push_column(name.clone(), Column::Float(mapped))?;
        }
        Ok(out)
    }
}
