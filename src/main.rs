//! APOD Proxy - cache NASA's Astronomy Picture of the Day and serve it over HTTP

use std::sync::Arc;

use clap::Parser;

use apodproxy::cli::Cli;
use apodproxy::config::Settings;
use apodproxy::logging;
use apodproxy::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    logging::init(&settings.log_level, settings.log_format);
    tracing::info!(
        port = settings.port,
        cache_timeout = settings.cache_timeout,
        nasa_base_url = %settings.nasa_base_url,
        "configuration loaded"
    );

    let port = settings.port;
    let state = Arc::new(AppState::from_settings(settings)?);
    server::serve(state, port).await?;

    Ok(())
}
