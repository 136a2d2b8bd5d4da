mod assign;
mod rank;


pub(crate) use assign::cluster_ids;
pub use assign::{assign_cluster, assign_clusters, assign_with_model};
pub use rank::{top_n, top_n_for_vector, RankedSong};

use crate::error::{EngineError, Result};
use crate::table::FeatureTable;
use tracing::error;

/// Fail closed on the first requested feature `table` lacks
fn require_features(table: &FeatureTable, features: &[String]) -> Result<()> {
    if let Some(missing) = table.missing_features(features).first() {
        error!(feature = *missing, "The selected feature is not an available song feature");
        return Err(EngineError::missing(*missing));
    }
    Ok(())
}
