//! One-step consumption prediction

mod onnx;

pub use onnx::{InferenceStats, ModelArtifact, OnnxStepModel, DEFAULT_SLOW_INFERENCE};

use crate::error::Result;
use crate::models::{ConsumptionWindow, NormalizedVector};

/// A trained sequence-to-one model.
///
/// Implementations must be deterministic for fixed inputs and safe to share
/// across concurrent forecasts. They never learn from what they see.
pub trait StepModel: Send + Sync {
    /// Predict the next normalized consumption value from the current window
    /// and the scaled exogenous vector.
    fn predict_step(&self, window: &ConsumptionWindow, exo: &NormalizedVector) -> Result<f64>;

    /// Version of the loaded artifact
    fn model_version(&self) -> &str;
}
