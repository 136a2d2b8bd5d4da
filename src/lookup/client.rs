use super::types::*;
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Provide at least one of song title or artist name")]
    EmptyQuery,

    #[error("Access token variable {0} is not set")]
    MissingToken(String),
}

/// Anything that can turn (title, artist) into raw song features
pub trait FeatureLookup {
    fn lookup(&self, title: &str, artist: &str) -> Result<LookupOutcome, LookupError>;
}

/// Combine title and artist into a search query. Blank fields are left out;
/// both blank is an error.
pub fn form_query(title: &str, artist: &str) -> Result<String, LookupError> {
    let title = title.trim();
    let artist = artist.trim();
    match (title.is_empty(), artist.is_empty()) {
        (false, false) => Ok(format!("artist:{} track:{}", artist, title)),
        (false, true) => Ok(format!("track:{}", title)),
        (true, false) => Ok(format!("artist:{}", artist)),
        (true, true) => {
            error!("Please provide at least one field. Song name or artist name.");
            Err(LookupError::EmptyQuery)
        }
    }
}

/// Search-then-fetch client for a Spotify-style web API
pub struct HttpFeatureLookup {
    http: Client,
    endpoint: String,
    token: String,
}

impl HttpFeatureLookup {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self, LookupError> {
        Self::with_timeout(endpoint, token, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Read the bearer token from the environment variable `token_env`
    pub fn from_env(
        endpoint: impl Into<String>,
        token_env: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let token =
            std::env::var(token_env).map_err(|_| LookupError::MissingToken(token_env.to_string()))?;
        Self::with_timeout(endpoint, token, timeout)
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, LookupError> {
        let response = self
            .http
            .get(format!("{}{}", self.endpoint, path))
            .bearer_auth(&self.token)
            .query(query)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LookupError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json()?)
    }
}

impl FeatureLookup for HttpFeatureLookup {
    fn lookup(&self, title: &str, artist: &str) -> Result<LookupOutcome, LookupError> {
        let q = form_query(title, artist)?;
        debug!(query = %q, "Searching for track");

        let found: SearchResponse = self.get(
            "/search",
            &[("q", q.as_str()), ("type", "track"), ("limit", "1"), ("offset", "0")],
        )?;

        let item = match found.tracks.items.first() {
            Some(item) if found.tracks.total > 0 => item.clone(),
            _ => {
                info!(query = %q, "The search returns nothing");
                return Ok(LookupOutcome::NotFound);
            }
        };

        let features: AudioFeaturesResponse =
            self.get(&format!("/audio-features/{}", item.id), &[])?;
        info!(track = %item.name, "1 song has been returned");
        Ok(LookupOutcome::Found(TrackFeatures::from_response(&item, features)))
    }
}
