//! ONNX inference using tract
//!
//! The hybrid forecasting network takes two inputs, the historical window
//! shaped `[1, W, 1]` and the scaled exogenous vector shaped `[1, F]`, and
//! produces a single normalized consumption value.

use super::StepModel;
use crate::error::{ForecastError, Result};
use crate::models::{ConsumptionWindow, NormalizedVector};
use crate::observability::ForecastMetrics;
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Inference latency above which a step is logged as slow
pub const DEFAULT_SLOW_INFERENCE: Duration = Duration::from_millis(50);

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Location and identity of a model artifact on disk
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub path: PathBuf,
    /// Expected hex-encoded SHA-256 of the file
    pub sha256: Option<String>,
    pub version: String,
}

enum Plan {
    Ready(TractModel),
    Unavailable(String),
}

/// Step model backed by an optimized tract plan
pub struct OnnxStepModel {
    plan: Plan,
    version: String,
    window_size: usize,
    num_features: usize,
    slow_threshold: Duration,
    metrics: ForecastMetrics,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    failed_inference_count: AtomicU64,
}

impl OnnxStepModel {
    /// Load, verify and optimize the artifact at `artifact.path`
    pub fn load(artifact: &ModelArtifact, window_size: usize, num_features: usize) -> Result<Self> {
        let bytes = std::fs::read(&artifact.path).map_err(|e| {
            ForecastError::artifact(format!(
                "failed to read model {}: {e}",
                artifact.path.display()
            ))
        })?;
        if let Some(expected) = &artifact.sha256 {
            verify_checksum(&bytes, expected)?;
        }
        let model = Self::from_bytes(&bytes, &artifact.version, window_size, num_features)?;
        info!(
            path = %artifact.path.display(),
            version = %artifact.version,
            size_bytes = bytes.len(),
            window_size,
            num_features,
            "Loaded forecasting model"
        );
        Ok(model)
    }

    pub fn from_bytes(
        model_bytes: &[u8],
        version: &str,
        window_size: usize,
        num_features: usize,
    ) -> Result<Self> {
        let plan = Self::load_plan(model_bytes, window_size, num_features)
            .map_err(|e| ForecastError::artifact(format!("{e:#}")))?;
        Ok(Self::with_plan(
            Plan::Ready(plan),
            version,
            window_size,
            num_features,
        ))
    }

    /// A model whose artifact could not be loaded; every prediction fails.
    pub fn unavailable(reason: impl Into<String>, window_size: usize, num_features: usize) -> Self {
        Self::with_plan(
            Plan::Unavailable(reason.into()),
            "unavailable",
            window_size,
            num_features,
        )
    }

    fn with_plan(plan: Plan, version: &str, window_size: usize, num_features: usize) -> Self {
        Self {
            plan,
            version: version.to_string(),
            window_size,
            num_features,
            slow_threshold: DEFAULT_SLOW_INFERENCE,
            metrics: ForecastMetrics::new(),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
            failed_inference_count: AtomicU64::new(0),
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    fn load_plan(
        model_bytes: &[u8],
        window_size: usize,
        num_features: usize,
    ) -> anyhow::Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, window_size, 1]).into())
            .context("Failed to set window input shape")?
            .with_input_fact(1, f32::fact([1, num_features]).into())
            .context("Failed to set exogenous input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    pub fn is_available(&self) -> bool {
        matches!(self.plan, Plan::Ready(_))
    }

    /// Reason the artifact is unavailable, if it is
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.plan {
            Plan::Ready(_) => None,
            Plan::Unavailable(reason) => Some(reason),
        }
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            failed_inferences: self.failed_inference_count.load(Ordering::Relaxed),
        }
    }

    fn to_tensors(
        &self,
        window: &ConsumptionWindow,
        exo: &NormalizedVector,
    ) -> Result<(Tensor, Tensor)> {
        if window.len() != self.window_size {
            return Err(ForecastError::model(format!(
                "window has {} values, model expects {}",
                window.len(),
                self.window_size
            )));
        }
        if exo.len() != self.num_features {
            return Err(ForecastError::model(format!(
                "exogenous vector has {} values, model expects {}",
                exo.len(),
                self.num_features
            )));
        }
        let history: Vec<f32> = window.values().iter().map(|&v| v as f32).collect();
        let history = tract_ndarray::Array3::from_shape_vec((1, self.window_size, 1), history)
            .map_err(ForecastError::model)?;
        let conditions: Vec<f32> = exo.as_slice().iter().map(|&v| v as f32).collect();
        let conditions = tract_ndarray::Array2::from_shape_vec((1, self.num_features), conditions)
            .map_err(ForecastError::model)?;
        Ok((history.into(), conditions.into()))
    }

    fn run(
        &self,
        model: &TractModel,
        window: &ConsumptionWindow,
        exo: &NormalizedVector,
    ) -> Result<f64> {
        let (history, conditions) = self.to_tensors(window, exo)?;
        let outputs = model
            .run(tvec!(history.into(), conditions.into()))
            .map_err(|e| ForecastError::model(format!("{e:#}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| ForecastError::model("model produced no output"))?;
        let value = output
            .to_array_view::<f32>()
            .map_err(ForecastError::model)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ForecastError::model("model output tensor is empty"))?;
        if !value.is_finite() {
            return Err(ForecastError::model(format!(
                "model produced a non-finite value ({value})"
            )));
        }
        Ok(f64::from(value))
    }
}

impl StepModel for OnnxStepModel {
    fn predict_step(&self, window: &ConsumptionWindow, exo: &NormalizedVector) -> Result<f64> {
        let model = match &self.plan {
            Plan::Ready(model) => model,
            Plan::Unavailable(reason) => {
                self.failed_inference_count.fetch_add(1, Ordering::Relaxed);
                return Err(ForecastError::model(format!(
                    "model artifact unavailable: {reason}"
                )));
            }
        };

        let start = Instant::now();
        let result = self.run(model, window, exo);
        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.observe_model_step(elapsed.as_secs_f64());

        if result.is_err() {
            self.failed_inference_count.fetch_add(1, Ordering::Relaxed);
        } else if elapsed > self.slow_threshold {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                threshold_ms = self.slow_threshold.as_millis(),
                "Inference exceeded latency target"
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }
        result
    }

    fn model_version(&self) -> &str {
        &self.version
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    pub failed_inferences: u64,
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = compute_checksum(data);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ForecastError::artifact(format!(
            "model checksum mismatch: expected {expected}, got {actual}"
        )))
    }
}
