//! Request orchestration
//!
//! Validates a forecast request, composes scaler, history, model and engine,
//! and returns the prediction in raw consumption units.

use crate::engine::IterativeForecaster;
use crate::error::{ForecastError, Result};
use crate::history::{load_window, HistorySource};
use crate::models::{ExogenousVector, ForecastHorizon, ForecastRequest, ForecastResponse};
use crate::observability::{ForecastMetrics, StructuredLogger};
use crate::predictor::StepModel;
use crate::scaler::ScalerAdapter;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default cap on the requested horizon (one week of hourly steps)
pub const DEFAULT_MAX_HORIZON: u32 = 168;

/// Immutable forecasting service shared by all requests
pub struct ForecastService {
    scaler: Arc<ScalerAdapter>,
    model: Arc<dyn StepModel>,
    history: Arc<dyn HistorySource>,
    window_size: usize,
    max_horizon: Option<u32>,
    metrics: ForecastMetrics,
    logger: StructuredLogger,
}

impl ForecastService {
    pub fn new(
        scaler: Arc<ScalerAdapter>,
        model: Arc<dyn StepModel>,
        history: Arc<dyn HistorySource>,
        window_size: usize,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(ForecastError::artifact("window size must be at least 1"));
        }
        Ok(Self {
            scaler,
            model,
            history,
            window_size,
            max_horizon: Some(DEFAULT_MAX_HORIZON),
            metrics: ForecastMetrics::new(),
            logger: StructuredLogger::new("default"),
        })
    }

    /// Cap accepted horizons; `None` accepts any positive horizon.
    pub fn with_max_horizon(mut self, max_horizon: Option<u32>) -> Self {
        self.max_horizon = max_horizon;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn feature_names(&self) -> &[String] {
        self.scaler.feature_names()
    }

    pub fn model_version(&self) -> &str {
        self.model.model_version()
    }

    /// Validate and serve a wire request
    pub fn predict(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        let horizon = self.validate_horizon(request.horizon)?;
        let exogenous = ExogenousVector::from_inputs(self.scaler.feature_names(), &request.exogenous)?;
        let predicted_consumption = self.forecast(horizon, &exogenous)?;
        Ok(ForecastResponse {
            predicted_consumption,
        })
    }

    /// Raw consumption forecast `horizon` hours past the latest reading
    pub fn forecast(&self, horizon: ForecastHorizon, exogenous: &ExogenousVector) -> Result<f64> {
        let start = Instant::now();

        let scaled = self.scaler.scale_features(exogenous)?;
        let window = load_window(self.history.as_ref(), self.window_size, &self.scaler)?;
        let normalized =
            IterativeForecaster::new(self.model.as_ref()).forecast(&window, &scaled, horizon)?;
        let predicted = self.scaler.unscale_target(normalized);

        let elapsed = start.elapsed();
        debug!(
            horizon = horizon.get(),
            normalized,
            predicted,
            "Forecast rollout finished"
        );
        self.metrics
            .observe_forecast(elapsed.as_secs_f64(), horizon.get());
        self.logger.log_forecast(
            horizon.get(),
            predicted,
            self.model.model_version(),
            elapsed.as_millis(),
        );
        Ok(predicted)
    }

    fn validate_horizon(&self, hours: i64) -> Result<ForecastHorizon> {
        let horizon = ForecastHorizon::new(hours)?;
        match self.max_horizon {
            Some(max) if horizon.get() > max => Err(ForecastError::Validation(format!(
                "hours ahead must be at most {max}, got {hours}"
            ))),
            _ => Ok(horizon),
        }
    }
}
