//! Energy forecaster - residential consumption prediction service
//!
//! Loads the fitted scalers and ONNX model once, then serves forecasts and
//! per-building usage reports over HTTP.

use anyhow::Result;
use forecaster::{api, build_state, config::ForecasterConfig};
use forecaster_lib::observability::StructuredLogger;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const FORECASTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting energy forecaster");

    let config = ForecasterConfig::load()?;
    info!(
        port = config.port,
        window_size = config.window_size,
        max_horizon = config.max_horizon,
        "Forecaster configured"
    );

    let logger = StructuredLogger::new(&config.site);
    let state = build_state(&config, logger.clone()).await?;
    logger.log_startup(
        FORECASTER_VERSION,
        state.service.model_version(),
        state.service.window_size(),
    );

    let addr = format!("{}:{}", config.bind_address, config.port);
    let shutdown = api::shutdown_on(tokio::signal::ctrl_c(), logger.clone());
    api::serve(&addr, state, shutdown).await?;

    info!("Shutting down");
    Ok(())
}
