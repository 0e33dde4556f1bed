//! APOD Proxy Library
//!
//! Caches NASA's Astronomy Picture of the Day behind a single-entry TTL cache
//! and serves it over HTTP. The modules are exposed for integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod server;
