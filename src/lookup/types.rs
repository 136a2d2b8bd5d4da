// the metadata API contract
use crate::table::{FeatureTable, Record, Value};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
pub struct TrackPage {
    pub total: u64,
    #[serde(default)]
    pub items: Vec<TrackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<ArtistItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistItem {
    pub name: String,
}

/// Raw audio-features object, kept as the API sent it
pub type AudioFeaturesResponse = IndexMap<String, serde_json::Value>;

/// A track the lookup service matched, with its raw feature record
///
/// The record keeps the service's own column names (`uri`, `duration_ms`,
/// ...); the feature pipeline renames and selects from it. A match may
/// still lack some features.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeatures {
    pub title: String,
    pub artist: Option<String>,
    pub record: Record,
}

impl TrackFeatures {
    pub fn from_response(item: &TrackItem, features: AudioFeaturesResponse) -> Self {
        let mut record: Record = features
            .into_iter()
            .filter_map(|(k, v)| json_cell(&v).map(|cell| (k, cell)))
            .collect();
        record
            .entry("name".to_string())
            .or_insert_with(|| Value::Text(item.name.clone()));
        if !item.uri.is_empty() {
            record
                .entry("uri".to_string())
                .or_insert_with(|| Value::Text(item.uri.clone()));
        }

        Self {
            title: item.name.clone(),
            artist: item.artists.first().map(|a| a.name.clone()),
            record,
        }
    }

    /// One-row table of the raw record
    pub fn to_table(&self) -> crate::error::Result<FeatureTable> {
        FeatureTable::from_records(std::slice::from_ref(&self.record))
    }
}

// nulls, bools and nested objects carry no feature
fn json_cell(v: &serde_json::Value) -> Option<Value> {
    match v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

/// Result of one lookup. "No match" is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    NotFound,
    Found(TrackFeatures),
}
