//! Residential energy consumption forecasting
//!
//! This crate provides:
//! - Fitted feature and target scaling
//! - Historical window loading from CSV
//! - One-step ONNX inference and the iterative multi-step engine
//! - The request-level forecast service
//! - Per-building usage reports
//! - Health checks and observability

pub mod chart;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod scaler;
pub mod service;
pub mod usage;

pub use engine::IterativeForecaster;
pub use error::{ErrorKind, ForecastError, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, ReadinessReport};
pub use history::{CsvHistorySource, HistorySource, StaticHistory};
pub use models::*;
pub use observability::{ForecastMetrics, StructuredLogger};
pub use predictor::{ModelArtifact, OnnxStepModel, StepModel};
pub use scaler::{FittedTransform, ScalerAdapter, ScalerArtifact};
pub use service::ForecastService;
pub use usage::UsageSource;
