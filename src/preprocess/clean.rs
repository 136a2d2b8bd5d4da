use super::NormalizationParams;
use crate::error::{EngineError, Result};
use crate::table::{FeatureTable, CLUSTER_ID};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the permissive stages (cleaning, featurizing, training-data
/// selection) do when a requested feature is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    /// Fail with `MissingFeature`
    Error,
    /// Warn and continue with every available column
    #[default]
    FallbackToAll,
}

/// Whether every one of `features` is a column of `table`.
/// An empty request never validates.
pub fn validate_features(table: &FeatureTable, features: &[String]) -> bool {
    if features.is_empty() {
        warn!("The given feature list is empty");
        return false;
    }
    table.contains_all(features)
}

/// Project `table` onto `features`, or apply `policy` when some are absent.
/// The fallback keeps every column except `clusterId`.
fn select_or_fallback(
    table: &FeatureTable,
    features: &[String],
    policy: MissingFeaturePolicy,
    stage: &str,
) -> Result<FeatureTable> {
    if validate_features(table, features) {
        return table.select(features);
    }

    let missing = table.missing_features(features);
    match policy {
        MissingFeaturePolicy::Error => Err(match missing.first() {
            Some(name) => EngineError::missing(*name),
            None => EngineError::invalid(format!("{}: no features requested", stage)),
        }),
        MissingFeaturePolicy::FallbackToAll => {
            let all = table.without_column(CLUSTER_ID);
            warn!(
                stage,
                missing = ?missing,
                "Requested features not all present; keeping all {} columns",
                all.n_cols()
            );
            Ok(all)
        }
    }
}

/// Rename raw columns and keep only `features`
///
/// Mapper keys that match no column are reported and skipped. A feature
/// list that does not fully match falls under `policy`.
pub fn clean(
    raw: &FeatureTable,
    col_mapper: &IndexMap<String, String>,
    features: &[String],
    policy: MissingFeaturePolicy,
) -> Result<FeatureTable> {
    let (renamed, unused) = raw.rename(col_mapper)?;
    if !unused.is_empty() {
        warn!(unused = ?unused, "Column mapper entries not present in raw data were not used");
    }
    select_or_fallback(&renamed, features, policy, "clean")
}

/// Standard-scale the numeric columns among `features`
///
/// Text columns pass through untouched and the output keeps the input
/// column order. Returns the params so later queries can be scaled the
/// same way.
pub fn featurize(
    cleaned: &FeatureTable,
    features: &[String],
    policy: MissingFeaturePolicy,
) -> Result<(FeatureTable, NormalizationParams)> {
    let selected = select_or_fallback(cleaned, features, policy, "featurize")?;
    let numeric = selected.numeric_subset();
    let params = NormalizationParams::fit(&numeric)?;

    if numeric.n_cols() == 0 {
        info!("No numeric columns to scale; returning passthrough columns");
        return Ok((selected, params));
    }

    let scaled = params.transform(&numeric)?;
    let mut out = FeatureTable::new();
    for (name, column) in selected.columns() {
        let column = if column.is_numeric() {
            scaled.column(name).unwrap_or(column)
        } else {
            column
        };
        out.push_column(name, column.clone())?;
    }

    info!(
        rows = out.n_rows(),
        scaled = params.features().len(),
        "Featurized table"
    );
    Ok((out, params))
}
