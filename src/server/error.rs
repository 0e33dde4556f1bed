//! HTTP error mapping for the route handlers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::ConfigError;
use crate::data::UpstreamError;

/// Failures surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    /// The cached APOD value declares no image
    #[error("No image found")]
    NoImage,

    /// The image host could not be reached or refused the request
    #[error("Image download failed: {0}")]
    ImageUpstream(#[from] UpstreamError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] ConfigError),

    #[error("Not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoImage | AppError::BadRequest(_) | AppError::Settings(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ImageUpstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients
    fn public_message(&self) -> String {
        match self {
            AppError::ImageUpstream(_) => "Could not download image".to_string(),
            AppError::Io(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::warn!(error = %self, %status, "request rejected");
        }
        (status, self.public_message()).into_response()
    }
}
