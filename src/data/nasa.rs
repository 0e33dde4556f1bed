//! NASA APOD API client
//!
//! One GET per fetch, no retries. Every failure is folded into the
//! [`FetchFailure`](super::FetchFailure) sentinel so the cache can store it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{ApodSource, FetchOutcome, UpstreamError};
use crate::config::LiveSettings;

/// Path of the APOD endpoint below the NASA API base URL
const APOD_PATH: &str = "/planetary/apod";

/// Upper bound on a single APOD request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for NASA's Astronomy Picture of the Day endpoint
#[derive(Debug, Clone)]
pub struct NasaClient {
    client: Client,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    /// Source of the API key, read on every fetch
    settings: LiveSettings,
}

impl NasaClient {
    /// Creates a client that takes its API key from `settings`
    pub fn new(base_url: impl Into<String>, settings: LiveSettings) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url, settings))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>, settings: LiveSettings) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
        }
    }

    /// Fetches and parses the APOD response for the current API key
    ///
    /// The body is parsed as JSON regardless of status, so the API's own error
    /// objects (e.g. an invalid key) come back as values like a normal payload.
    pub async fn fetch_apod(&self) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, APOD_PATH);
        let api_key = self.settings.api_key().await;

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let value: Value = serde_json::from_str(&text)?;

        tracing::info!(%status, "fetched APOD from NASA");
        Ok(value)
    }
}

#[async_trait]
impl ApodSource for NasaClient {
    async fn fetch(&self) -> FetchOutcome {
        self.fetch_apod().await.map_err(|err| {
            tracing::warn!(error = %err, "APOD fetch failed");
            err.into()
        })
    }
}
