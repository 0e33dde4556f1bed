//! HTTP front end
//!
//! Builds the shared [`AppState`] from resolved settings, wires the routes and
//! runs the server until Ctrl-C.

pub mod auth;
mod error;
mod handlers;

pub use auth::{Authenticator, BearerToken, OpenAccess};
pub use error::AppError;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::cache::ApodCache;
use crate::config::{LiveSettings, Settings};
use crate::data::{ImageClient, NasaClient, UpstreamError};

/// Everything the handlers share, created once per process
pub struct AppState {
    pub cache: ApodCache,
    pub images: ImageClient,
    pub settings: LiveSettings,
    pub auth: Arc<dyn Authenticator>,
    /// Directory `favicon.ico` is served from
    pub static_dir: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wires the production collaborators for `settings`
    pub fn from_settings(settings: Settings) -> Result<Self, UpstreamError> {
        let auth = auth::from_token(settings.operator_token.as_deref());
        let static_dir = settings.static_dir.clone();
        let nasa_base_url = settings.nasa_base_url.clone();
        let live = LiveSettings::new(settings);

        let nasa = NasaClient::new(nasa_base_url, live.clone())?;
        Ok(Self {
            cache: ApodCache::new(Arc::new(nasa), live.clone()),
            images: ImageClient::new()?,
            settings: live,
            auth,
            static_dir,
        })
    }
}

/// Builds the router over `state`
///
/// `/clear`, `/settings` and `/submit` sit behind the operator gate; the rest
/// is public.
pub fn router(state: SharedState) -> Router {
    let operator = Router::new()
        .route("/clear", get(handlers::clear))
        .route("/settings", get(handlers::settings))
        .route("/submit", post(handlers::submit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_operator,
        ));

    Router::new()
        .route("/info", get(handlers::info))
        .route("/image", get(handlers::image))
        .route("/status", get(handlers::status))
        .route("/favicon.ico", get(handlers::favicon))
        .merge(operator)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves on all interfaces at `port` until Ctrl-C
pub async fn serve(state: SharedState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "APOD proxy listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
