//! Image download for the `/image` proxy endpoint

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::UpstreamError;

/// Content type assumed when the image host does not send one
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Image bytes plus the content type to serve them with
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Downloads images referenced by APOD payloads
#[derive(Debug, Clone)]
pub struct ImageClient {
    client: Client,
}

impl ImageClient {
    pub fn new() -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Downloads `url`, failing on transport errors and non-success statuses
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, UpstreamError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!(url, %content_type, size = bytes.len(), "downloaded APOD image");
        Ok(FetchedImage {
            content_type,
            bytes,
        })
    }
}
