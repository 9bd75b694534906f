//! Artifact loading and application wiring

use crate::api::AppState;
use crate::config::ForecasterConfig;
use anyhow::{Context, Result};
use forecaster_lib::{
    health::{components, HealthRegistry},
    history::{CsvHistorySource, HistorySource},
    observability::{ForecastMetrics, StructuredLogger},
    predictor::{ModelArtifact, OnnxStepModel},
    scaler::ScalerAdapter,
    service::ForecastService,
    usage::UsageSource,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Load every artifact named by `config` and build the shared state.
///
/// Unreadable scalers abort startup. A model that fails to load leaves the
/// server running with the model marked unhealthy.
pub async fn build_state(config: &ForecasterConfig, logger: StructuredLogger) -> Result<Arc<AppState>> {
    let health_registry = HealthRegistry::new();

    let scaler = ScalerAdapter::from_files(&config.feature_scaler_path, &config.target_scaler_path)
        .with_context(|| {
            format!(
                "Failed to load scalers from {} and {}",
                config.feature_scaler_path.display(),
                config.target_scaler_path.display()
            )
        })?;
    let num_features = scaler.feature_names().len();
    health_registry.set_healthy(components::SCALERS).await;
    info!(num_features, "Scalers loaded");

    let model = load_model(config, num_features, &health_registry).await;

    let history = CsvHistorySource::new(&config.history_path, &config.consumption_column);
    probe_history(&history, config.window_size, &health_registry).await;

    let usage = UsageSource::new(&config.buildings_dir)
        .with_columns(&config.date_column, &config.consumption_column);
    if usage.is_available() {
        health_registry.set_healthy(components::USAGE_DATA).await;
    } else {
        health_registry
            .set_degraded(
                components::USAGE_DATA,
                format!("{} is not a directory", usage.data_dir().display()),
            )
            .await;
    }

    let service = ForecastService::new(
        Arc::new(scaler),
        Arc::new(model),
        Arc::new(history),
        config.window_size,
    )?
    .with_max_horizon(config.max_horizon())
    .with_logger(logger.clone());

    let state = AppState::new(
        Arc::new(service),
        Arc::new(usage),
        health_registry.clone(),
        logger,
        config.forecast_timeout(),
    );
    health_registry.set_started(true).await;
    Ok(Arc::new(state))
}

async fn load_model(
    config: &ForecasterConfig,
    num_features: usize,
    health_registry: &HealthRegistry,
) -> OnnxStepModel {
    let artifact = ModelArtifact {
        path: config.model_path.clone(),
        sha256: config.model_sha256.clone(),
        version: config.model_version.clone(),
    };
    let model = match OnnxStepModel::load(&artifact, config.window_size, num_features) {
        Ok(model) => {
            health_registry.set_healthy(components::MODEL).await;
            model
        }
        Err(e) => {
            warn!(
                path = %artifact.path.display(),
                error = %e,
                "Model unavailable; forecasts will fail until it is fixed"
            );
            health_registry
                .set_unhealthy(components::MODEL, e.to_string())
                .await;
            OnnxStepModel::unavailable(e.to_string(), config.window_size, num_features)
        }
    };

    ForecastMetrics::new().set_model_version(&config.model_version, model.is_available());
    model.with_slow_threshold(config.slow_inference())
}

/// History is re-read per request, so problems here only degrade health.
async fn probe_history(history: &CsvHistorySource, window_size: usize, health_registry: &HealthRegistry) {
    match history.read_series() {
        Ok(series) if series.len() >= window_size => {
            health_registry.set_healthy(components::HISTORY).await;
        }
        Ok(series) => {
            health_registry
                .set_degraded(
                    components::HISTORY,
                    format!("{} readings, {window_size} required", series.len()),
                )
                .await;
        }
        Err(e) => {
            warn!(source = %history.describe(), error = %e, "History not readable");
            health_registry
                .set_degraded(components::HISTORY, e.to_string())
                .await;
        }
    }
}
