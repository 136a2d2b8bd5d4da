pub mod client;
pub mod types;


pub use client::{form_query, FeatureLookup, HttpFeatureLookup, LookupError};
pub use types::{LookupOutcome, SearchResponse, TrackFeatures};
