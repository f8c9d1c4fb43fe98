//! RELX API Server
//!
//! Loads the model artifacts named by the configuration and serves them
//! over HTTP.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use anyhow::Context;
use relx_api::{serve, state::AppState, telemetry::init_tracing};
use relx_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("RELX_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;

    init_tracing(&config.logging);

    let state = AppState::from_config(config).context("failed to load model artifacts")?;
    serve(Arc::new(state)).await
}
