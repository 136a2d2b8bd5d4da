use crate::db::SongStore;
use crate::lookup::{FeatureLookup, LookupOutcome, TrackFeatures};
use crate::modelpack::ModelPack;
use crate::preprocess::FeaturePipeline;
use crate::search::{assign_with_model, top_n};
use crate::table::{Catalog, Song};
use crate::workflow::scaled_with_labels;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// A catalog song picked for a query, with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendedSong {
    pub song: Song,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    /// The lookup service has no such song
    NotFound,
    Found {
        query: TrackFeatures,
        cluster_id: u32,
        songs: Vec<RecommendedSong>,
    },
}

/// Lookup, scale with the stored params, assign to a stored centroid, then
/// rank that cluster's catalog songs
///
/// The store's labels must come from the same model version as the pack.
pub struct Recommender<L> {
    lookup: L,
    pipeline: FeaturePipeline,
    pack: ModelPack,
}

impl<L: FeatureLookup> Recommender<L> {
    pub fn new(lookup: L, pipeline: FeaturePipeline, pack: ModelPack) -> Self {
        Self {
            lookup,
            pipeline,
            pack,
        }
    }

    pub fn pack(&self) -> &ModelPack {
        &self.pack
    }

    pub fn recommend(
        &self,
        store: &SongStore,
        title: &str,
        artist: &str,
        n: usize,
    ) -> Result<Recommendation> {
        let version = &self.pack.manifest.version;
        let labeled_by = store.label_version()?;
        if labeled_by.as_deref() != Some(version.as_str()) {
            bail!(
                "Catalog labels come from model version {}, not {}; retrain or load that version",
                labeled_by.as_deref().unwrap_or("none"),
                version
            );
        }

        let track = match self.lookup.lookup(title, artist)? {
            LookupOutcome::NotFound => return Ok(Recommendation::NotFound),
            LookupOutcome::Found(track) => track,
        };

        let metric = self.pack.metric();
        let features = self.pack.model.features();
        let raw = track.to_table()?;
        let query = self
            .pipeline
            .prepare_query(&raw, &self.pack.params)
            .context(format!("Song '{}' cannot be scaled like the catalog", track.title))?;

        let cluster_id = assign_with_model(&query, &self.pack.model, features, metric)?
            .first()
            .copied()
            .context("No cluster assigned")?;
        debug!(cluster = cluster_id, %metric, "Query assigned");

        let members = store.get_songs_in_cluster(cluster_id)?;
        let songs = if members.is_empty() {
            vec![]
        } else {
            let table = Catalog::new(members.clone()).to_table()?;
            let pool = scaled_with_labels(&table, &self.pack.params, features)?;
            top_n(&query, &pool, features, n, cluster_id, metric)?
                .into_iter()
                .map(|r| RecommendedSong {
                    song: members[r.row].clone(),
                    score: r.score,
                })
                .collect()
        };

        info!(
            title = %track.title,
            cluster = cluster_id,
            returned = songs.len(),
            "Recommendations ready"
        );
        Ok(Recommendation::Found {
            query: track,
            cluster_id,
            songs,
        })
    }
}
