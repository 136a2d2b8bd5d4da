use super::{clean, MissingFeaturePolicy, NormalizationParams};
use crate::error::Result;
use crate::table::FeatureTable;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column handling shared by training and query time
///
/// A query row goes through the same renames and selection as the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    /// Raw column -> cleaned column renames
    pub col_mapper: IndexMap<String, String>,
    /// Columns kept by `clean`
    pub clean_features: Vec<String>,
    /// Columns used for distances
    pub features: Vec<String>,
    pub on_missing_feature: MissingFeaturePolicy,
}

impl FeaturePipeline {
    pub fn clean(&self, raw: &FeatureTable) -> Result<FeatureTable> {
        clean(
            raw,
            &self.col_mapper,
            &self.clean_features,
            self.on_missing_feature,
        )
    }

    /// Clean raw query rows and scale them with already fitted params.
    /// Only the params' features come out.
    pub fn prepare_query(
        &self,
        raw: &FeatureTable,
        params: &NormalizationParams,
    ) -> Result<FeatureTable> {
        params.transform(&self.clean(raw)?)
    }
}
