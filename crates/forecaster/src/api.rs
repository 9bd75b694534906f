//! HTTP API: forecasts, usage reports, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use forecaster_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::{ForecastRequest, ForecastResponse, UsageReport},
    observability::{ForecastMetrics, StructuredLogger},
    service::ForecastService,
    usage::{parse_query_date, UsageSource},
    ErrorKind, ForecastError,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Liveness text served at `/`
pub const ROOT_MESSAGE: &str = "Energy Consumption Prediction API is running!";

/// Shared application state
pub struct AppState {
    pub service: Arc<ForecastService>,
    pub usage: Arc<UsageSource>,
    pub health_registry: HealthRegistry,
    pub metrics: ForecastMetrics,
    pub logger: StructuredLogger,
    pub forecast_timeout: Duration,
}

impl AppState {
    pub fn new(
        service: Arc<ForecastService>,
        usage: Arc<UsageSource>,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
        forecast_timeout: Duration,
    ) -> Self {
        Self {
            service,
            usage,
            health_registry,
            metrics: ForecastMetrics::new(),
            logger,
            forecast_timeout,
        }
    }

    /// Log and count a failed request
    fn fail(&self, endpoint: &str, error: ForecastError) -> ApiError {
        let kind = error.kind();
        self.metrics.inc_request_errors(endpoint, kind.as_str());
        self.logger
            .log_request_failed(endpoint, kind.as_str(), &error.to_string());
        ApiError(error)
    }
}

/// Error response body `{"error": ...}` with a status derived from the kind
#[derive(Debug)]
pub struct ApiError(pub ForecastError);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::ShapeMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientHistory
        | ErrorKind::MissingColumn
        | ErrorKind::ModelInvocation
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn root() -> &'static str {
    ROOT_MESSAGE
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        state.fail(
            "predict",
            ForecastError::Validation(format!("Invalid request body: {}", rejection.body_text())),
        )
    })?;

    let service = Arc::clone(&state.service);
    let task = tokio::task::spawn_blocking(move || service.predict(&request));
    let result = match tokio::time::timeout(state.forecast_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ForecastError::ModelInvocation(format!(
            "forecast task failed: {join_error}"
        ))),
        Err(_) => Err(ForecastError::ModelInvocation(format!(
            "forecast timed out after {} ms",
            state.forecast_timeout.as_millis()
        ))),
    };

    result
        .map(Json)
        .map_err(|error| state.fail("predict", error))
}

/// Query string of `GET /metrics`
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub building: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl UsageQuery {
    fn parse(&self) -> Result<(String, NaiveDate, NaiveDate), ForecastError> {
        let building = required(&self.building, "building")?.to_string();
        let start = parse_query_date("start_date", required(&self.start_date, "start_date")?)?;
        let end = parse_query_date("end_date", required(&self.end_date, "end_date")?)?;
        Ok((building, start, end))
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ForecastError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ForecastError::Validation(format!("{name} is required")))
}

async fn usage_report(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UsageQuery>, QueryRejection>,
) -> Result<Json<UsageReport>, ApiError> {
    let Query(query) = query
        .map_err(|rejection| state.fail("usage", ForecastError::Validation(rejection.body_text())))?;

    let (building, start, end) = query
        .parse()
        .map_err(|error| state.fail("usage", error))?;

    let usage = Arc::clone(&state.usage);
    let result = tokio::task::spawn_blocking(move || usage.report(&building, start, end))
        .await
        .unwrap_or_else(|join_error| {
            Err(ForecastError::DataSource(format!(
                "usage task failed: {join_error}"
            )))
        });

    let report = result.map_err(|error| state.fail("usage", error))?;
    state.metrics.inc_usage_reports();
    state
        .logger
        .log_usage_report(&report.building, report.samples, report.total_consumption);
    Ok(Json(report))
}

/// 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn prometheus_metrics() -> Response {
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/metrics", get(usage_report))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Completes when `signal` fires, for use as the graceful-shutdown future.
///
/// If the listener itself fails, the error is logged and the returned future
/// never completes, so the server keeps serving.
pub async fn shutdown_on<F>(signal: F, logger: StructuredLogger)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => logger.log_shutdown("SIGINT received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_completes_on_signal() {
        let shutdown = shutdown_on(async { Ok(()) }, StructuredLogger::new("test"));
        tokio::time::timeout(Duration::from_millis(100), shutdown)
            .await
            .expect("shutdown should complete once the signal fires");
    }

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_serving() {
        let failing = async { Err(std::io::Error::other("no signal handler")) };
        let shutdown = shutdown_on(failing, StructuredLogger::new("test"));
        let result = tokio::time::timeout(Duration::from_millis(100), shutdown).await;
        assert!(result.is_err(), "shutdown must not complete when the listener fails");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::ShapeMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        for kind in [
            ErrorKind::InsufficientHistory,
            ErrorKind::MissingColumn,
            ErrorKind::ModelInvocation,
            ErrorKind::Internal,
        ] {
            assert_eq!(status_for(kind), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!kind.is_client_error());
        }
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(&Some("  ".to_string()), "building").is_err());
        assert!(required(&None, "building").is_err());
        assert_eq!(required(&Some("A".to_string()), "building").unwrap(), "A");
    }
}
