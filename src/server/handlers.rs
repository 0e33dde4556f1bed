//! Route handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::error::AppError;
use super::SharedState;
use crate::config::{SettingsUpdate, SettingsView};
use crate::data::{image_url, outcome_to_json};

const FAVICON_FILE: &str = "favicon.ico";

/// `GET /info`: the cached APOD value as JSON
pub async fn info(State(state): State<SharedState>) -> Json<Value> {
    let outcome = state.cache.get().await;
    Json(outcome_to_json(&outcome))
}

/// `GET /image`: proxies the picture the cached APOD value points at
///
/// Nothing is downloaded when the value has no `url`.
pub async fn image(State(state): State<SharedState>) -> Result<Response, AppError> {
    let outcome = state.cache.get().await;
    let url = image_url(&outcome).ok_or(AppError::NoImage)?;

    let image = state.images.fetch(url).await?;
    Ok(([(CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

/// `GET /clear`: drops the cached value
pub async fn clear(State(state): State<SharedState>) -> (StatusCode, &'static str) {
    state.cache.clear().await;
    (StatusCode::OK, "Cleared cache")
}

/// Cache state reported by `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_error: bool,
    pub is_expired: bool,
    pub ttl_seconds: u64,
}

/// `GET /status`: what the cache holds, without triggering a fetch
pub async fn status(State(state): State<SharedState>) -> Json<StatusReport> {
    let snapshot = state.cache.peek().await;
    let ttl_seconds = state.settings.cache_timeout().await;

    Json(match snapshot {
        Some(snapshot) => StatusReport {
            cached: true,
            cached_at: Some(snapshot.cached_at),
            expires_at: Some(snapshot.expires_at),
            is_error: snapshot.is_error,
            is_expired: snapshot.is_expired,
            ttl_seconds,
        },
        None => StatusReport {
            cached: false,
            cached_at: None,
            expires_at: None,
            is_error: false,
            is_expired: false,
            ttl_seconds,
        },
    })
}

/// `GET /settings`: current operator-editable values
pub async fn settings(State(state): State<SharedState>) -> Json<SettingsView> {
    Json(state.settings.view().await)
}

/// `POST /submit`: updates the API key and/or TTL in memory
pub async fn submit(
    State(state): State<SharedState>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<(StatusCode, &'static str), AppError> {
    let Json(update) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let view = state.settings.apply(update).await?;
    tracing::info!(cache_timeout = view.cache_timeout, "settings updated");
    Ok((StatusCode::OK, "Config saved"))
}

/// `GET /favicon.ico` from the static directory
pub async fn favicon(State(state): State<SharedState>) -> Result<Response, AppError> {
    let path = state.static_dir.join(FAVICON_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(err) => return Err(err.into()),
    };
    Ok(([(CONTENT_TYPE, "image/x-icon")], bytes).into_response())
}
