//! Upstream data types and clients for APOD Proxy
//!
//! This module contains the tagged result produced by every APOD fetch, the
//! `ApodSource` seam the cache fetches through, and the HTTP clients that talk
//! to NASA and to the image hosts.

pub mod image;
pub mod nasa;

pub use image::{FetchedImage, ImageClient};
pub use nasa::NasaClient;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Message shown to clients in place of APOD data when the upstream call failed
pub const FETCH_FAILURE_MESSAGE: &str = "Could not get APOD information from Nasa API";

/// Errors that can occur when talking to an upstream host
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    Status(reqwest::StatusCode),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Sentinel stored in place of APOD data when a fetch fails
///
/// The reason is kept for logs and status reporting; clients only ever see
/// [`FETCH_FAILURE_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Why the fetch failed
    pub reason: String,
}

impl FetchFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<UpstreamError> for FetchFailure {
    fn from(err: UpstreamError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of a single APOD fetch
///
/// Failures are values: the cache stores and serves an `Err` exactly like an
/// `Ok` until it expires or is cleared.
pub type FetchOutcome = Result<Value, FetchFailure>;

/// Renders an outcome as the JSON body returned by `/info`
pub fn outcome_to_json(outcome: &FetchOutcome) -> Value {
    match outcome {
        Ok(value) => value.clone(),
        Err(_) => json!({ "error": FETCH_FAILURE_MESSAGE }),
    }
}

/// Extracts the image URL declared by an APOD payload
///
/// Returns `None` for the failure sentinel, for payloads without a `url`
/// field, and for a `url` that is not a non-empty string.
pub fn image_url(outcome: &FetchOutcome) -> Option<&str> {
    outcome
        .as_ref()
        .ok()?
        .get("url")?
        .as_str()
        .filter(|url| !url.is_empty())
}

/// Anything the APOD cache can fetch fresh data from
#[async_trait]
pub trait ApodSource: Send + Sync {
    /// Performs one upstream fetch; never fails, failures come back as `Err` values
    async fn fetch(&self) -> FetchOutcome;
}
