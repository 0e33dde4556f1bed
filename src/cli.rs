//! Command-line interface parsing for APOD Proxy
//!
//! Flags given on the command line override every other configuration layer.
//! Only the flags that were actually passed are merged, which is why the
//! override fields are serialized with `skip_serializing_if`.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::logging::LogFormat;

/// Printed below the flag list of `--help`
const OPERATOR_ACCESS_NOTE: &str = "\
Operator endpoints (/clear, /settings, /submit) require `Authorization: Bearer <token>` \
when `operator_token` is set in the config file or OPERATOR_TOKEN is exported. \
Without an operator token they are open to everyone, including reading and replacing the NASA API key.";

/// APOD Proxy - cache NASA's Astronomy Picture of the Day and serve it over HTTP
#[derive(Parser, Debug, Serialize)]
#[command(name = "apodproxy")]
#[command(about = "Caching proxy for NASA's Astronomy Picture of the Day")]
#[command(version)]
#[command(after_help = OPERATOR_ACCESS_NOTE)]
pub struct Cli {
    /// Path to a JSON config file
    ///
    /// When omitted, `~/.config/apodproxy/config.json` and `Config/config.json`
    /// are read if they exist.
    #[arg(long, short, value_name = "PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// NASA API key
    #[arg(long, value_name = "KEY")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Seconds an APOD response stays cached
    #[arg(long, value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_timeout: Option<u64>,

    /// Log output format
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,
}
