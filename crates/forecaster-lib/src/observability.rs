//! Observability infrastructure for the forecaster
//!
//! Provides:
//! - Prometheus metrics (forecast and step latency, horizon, outcomes, model version)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for forecast latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Histogram buckets for requested horizons (in hours)
const HORIZON_BUCKETS: &[f64] = &[1.0, 2.0, 4.0, 6.0, 12.0, 24.0, 48.0, 72.0, 168.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ForecastMetricsInner> = OnceLock::new();

struct ForecastMetricsInner {
    forecast_latency_seconds: Histogram,
    forecast_horizon_hours: Histogram,
    model_step_seconds: Histogram,
    forecasts_generated: IntCounter,
    usage_reports_generated: IntCounter,
    request_errors: IntCounterVec,
    model_version_info: GaugeVec,
    model_available: IntGauge,
}

impl ForecastMetricsInner {
    fn new() -> Self {
        Self {
            forecast_latency_seconds: register_histogram!(
                "energy_forecaster_forecast_latency_seconds",
                "Time spent producing one multi-step forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            forecast_horizon_hours: register_histogram!(
                "energy_forecaster_forecast_horizon_hours",
                "Requested forecast horizon in hours",
                HORIZON_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_horizon_hours"),

            model_step_seconds: register_histogram!(
                "energy_forecaster_model_step_seconds",
                "Time spent in one model invocation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_step_seconds"),

            forecasts_generated: register_int_counter!(
                "energy_forecaster_forecasts_generated_total",
                "Total number of forecasts returned to callers"
            )
            .expect("Failed to register forecasts_generated"),

            usage_reports_generated: register_int_counter!(
                "energy_forecaster_usage_reports_generated_total",
                "Total number of building usage reports returned"
            )
            .expect("Failed to register usage_reports_generated"),

            request_errors: register_int_counter_vec!(
                "energy_forecaster_request_errors_total",
                "Failed requests by endpoint and error kind",
                &["endpoint", "kind"]
            )
            .expect("Failed to register request_errors"),

            model_version_info: register_gauge_vec!(
                "energy_forecaster_model_version_info",
                "Information about the loaded forecasting model",
                &["version"]
            )
            .expect("Failed to register model_version_info"),

            model_available: register_int_gauge!(
                "energy_forecaster_model_available",
                "1 if the model artifact is loaded, 0 otherwise"
            )
            .expect("Failed to register model_available"),
        }
    }
}

/// Forecaster metrics for Prometheus exposition
///
/// Lightweight handle to the process-wide metrics; clones share them.
#[derive(Clone)]
pub struct ForecastMetrics {
    _private: (),
}

impl Default for ForecastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ForecastMetricsInner {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new)
    }

    /// Record a successful forecast
    pub fn observe_forecast(&self, duration_secs: f64, horizon_hours: u32) {
        let inner = self.inner();
        inner.forecast_latency_seconds.observe(duration_secs);
        inner.forecast_horizon_hours.observe(f64::from(horizon_hours));
        inner.forecasts_generated.inc();
    }

    pub fn observe_model_step(&self, duration_secs: f64) {
        self.inner().model_step_seconds.observe(duration_secs);
    }

    pub fn inc_usage_reports(&self) {
        self.inner().usage_reports_generated.inc();
    }

    pub fn inc_request_errors(&self, endpoint: &str, kind: &str) {
        self.inner()
            .request_errors
            .with_label_values(&[endpoint, kind])
            .inc();
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str, available: bool) {
        let inner = self.inner();
        inner.model_version_info.reset();
        inner.model_version_info.with_label_values(&[version]).set(1.0);
        inner.model_available.set(i64::from(available));
    }
}

/// Structured logger for forecaster events
///
/// Emits one JSON record per significant event so request outcomes can be
/// queried by field.
#[derive(Clone)]
pub struct StructuredLogger {
    site: String,
}

impl StructuredLogger {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn log_forecast(
        &self,
        horizon_hours: u32,
        predicted_consumption: f64,
        model_version: &str,
        duration_ms: u128,
    ) {
        info!(
            event = "forecast_generated",
            site = %self.site,
            horizon_hours,
            predicted_consumption,
            model_version = %model_version,
            duration_ms = duration_ms as u64,
            "Generated consumption forecast"
        );
    }

    pub fn log_request_failed(&self, endpoint: &str, kind: &str, error: &str) {
        warn!(
            event = "request_failed",
            site = %self.site,
            endpoint = %endpoint,
            kind = %kind,
            error = %error,
            "Request failed"
        );
    }

    pub fn log_usage_report(&self, building: &str, samples: usize, total_consumption: f64) {
        info!(
            event = "usage_reported",
            site = %self.site,
            building = %building,
            samples,
            total_consumption,
            "Generated usage report"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str, window_size: usize) {
        info!(
            event = "forecaster_started",
            site = %self.site,
            forecaster_version = %version,
            model_version = %model_version,
            window_size,
            "Energy forecaster started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "forecaster_shutdown",
            site = %self.site,
            reason = %reason,
            "Energy forecaster shutting down"
        );
    }
}
