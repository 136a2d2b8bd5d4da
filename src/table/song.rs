use super::{Column, FeatureTable, FeatureVector, Record};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Name of the label column carried by labeled tables
pub const CLUSTER_ID: &str = "clusterId";

/// Numeric audio features stored for every catalog song, in column order
pub const SONG_FEATURES: [&str; 11] = [
    "danceability",
    "energy",
    "loudness",
    "key",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "duration",
];

/// One catalog song with its audio features
///
/// Deserialization rejects unknown fields, so a record with a typo'd or
/// extra column never becomes a `Song`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Song {
    pub title: String,
    pub track_uri: String,
    #[serde(rename = "clusterId", default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u32>,
    pub danceability: f64,
    pub energy: f64,
    pub loudness: f64,
    pub key: i64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    /// Track length in milliseconds
    pub duration: i64,
}

impl Song {
    /// Build from a loose record, validating names and values
    pub fn from_record(record: &Record) -> Result<Self> {
        let value = serde_json::to_value(record)
            .map_err(|e| EngineError::invalid(format!("unserializable record: {}", e)))?;
        let song: Song = serde_json::from_value(value)
            .map_err(|e| EngineError::invalid(format!("bad song record: {}", e)))?;
        song.validate()?;
        Ok(song)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EngineError::invalid("song title is empty"));
        }
        if self.track_uri.trim().is_empty() {
            return Err(EngineError::invalid(format!(
                "song '{}' has an empty track_uri",
                self.title
            )));
        }
        if let Some((name, _)) = self.features().iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::invalid(format!(
                "song '{}' has a non-finite {}",
                self.title, name
            )));
        }
        Ok(())
    }

    pub fn features(&self) -> FeatureVector {
        [
            ("danceability", self.danceability),
            ("energy", self.energy),
            ("loudness", self.loudness),
            ("key", self.key as f64),
            ("speechiness", self.speechiness),
            ("acousticness", self.acousticness),
            ("instrumentalness", self.instrumentalness),
            ("liveness", self.liveness),
            ("valence", self.valence),
            ("tempo", self.tempo),
            ("duration", self.duration as f64),
        ]
        .into_iter()
        .collect()
    }
}

/// Ordered collection of songs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    songs: Vec<Song>,
}

impl Catalog {
    pub fn new(songs: Vec<Song>) -> Self {
        Self { songs }
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn is_labeled(&self) -> bool {
        !self.songs.is_empty() && self.songs.iter().all(|s| s.cluster_id.is_some())
    }

    /// Tabular view: title, track_uri, the audio features, and `clusterId`
    /// when every song carries one
    pub fn to_table(&self) -> Result<FeatureTable> {
        let floats = |f: fn(&Song) -> f64| Column::Float(self.songs.iter().map(f).collect());
        let ints = |f: fn(&Song) -> i64| Column::Integer(self.songs.iter().map(f).collect());

        let mut table = FeatureTable::from_columns([
            (
                "title",
                Column::Text(self.songs.iter().map(|s| s.title.clone()).collect()),
            ),
            (
                "track_uri",
                Column::Text(self.songs.iter().map(|s| s.track_uri.clone()).collect()),
            ),
            ("danceability", floats(|s| s.danceability)),
            ("energy", floats(|s| s.energy)),
            ("loudness", floats(|s| s.loudness)),
            ("key", ints(|s| s.key)),
            ("speechiness", floats(|s| s.speechiness)),
            ("acousticness", floats(|s| s.acousticness)),
            ("instrumentalness", floats(|s| s.instrumentalness)),
            ("liveness", floats(|s| s.liveness)),
            ("valence", floats(|s| s.valence)),
            ("tempo", floats(|s| s.tempo)),
            ("duration", ints(|s| s.duration)),
        ])?;

        if self.is_labeled() {
            table.push_column(
                CLUSTER_ID,
                Column::Integer(
                    self.songs
                        .iter()
                        .map(|s| s.cluster_id.unwrap_or_default() as i64)
                        .collect(),
                ),
            )?;
        }
        Ok(table)
    }

    pub fn from_table(table: &FeatureTable) -> Result<Self> {
        let songs = table
            .to_records()
            .iter()
            .map(Song::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { songs })
    }
}
