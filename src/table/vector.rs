use super::{Column, FeatureTable};
use crate::error::{EngineError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from feature name to value for one song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(IndexMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values for `features`, in that order. Any absent name is an error.
    pub fn values_for(&self, features: &[String]) -> Result<Vec<f64>> {
        features
            .iter()
            .map(|f| self.get(f).ok_or_else(|| EngineError::missing(f.as_str())))
            .collect()
    }

    /// Single-row table with one float column per feature
    pub fn to_table(&self) -> FeatureTable {
        let mut table = FeatureTable::new();
        for (name, value) in self.iter() {
            // names are unique keys of the map, lengths all 1
            let _ = table.push_column(name, Column::Float(vec![value]));
        }
        table
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
