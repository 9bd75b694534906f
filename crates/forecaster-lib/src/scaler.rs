//! Fitted feature and target transforms
//!
//! Scalers are fit offline alongside the model and shipped as JSON
//! artifacts holding the fitted parameters. Once loaded they are immutable
//! and shared read-only across requests.

use crate::error::{ForecastError, Result};
use crate::models::{ExogenousVector, NormalizedVector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A fitted, invertible, column-wise affine transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedTransform {
    /// `x * scale + min`, the scikit-learn `MinMaxScaler` parameterisation
    MinMax { scale: Vec<f64>, min: Vec<f64> },
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
}

impl FittedTransform {
    /// Rebuild min-max parameters from the observed data range.
    ///
    /// Constant columns get a unit range, matching how the training pipeline
    /// fit them.
    pub fn min_max_from_range(
        data_min: &[f64],
        data_max: &[f64],
        feature_range: (f64, f64),
    ) -> Result<Self> {
        if data_min.len() != data_max.len() {
            return Err(ForecastError::artifact(format!(
                "data_min has {} columns but data_max has {}",
                data_min.len(),
                data_max.len()
            )));
        }
        let (lo, hi) = feature_range;
        let mut scale = Vec::with_capacity(data_min.len());
        let mut min = Vec::with_capacity(data_min.len());
        for (&dmin, &dmax) in data_min.iter().zip(data_max) {
            let range = dmax - dmin;
            let range = if range.abs() < f64::EPSILON { 1.0 } else { range };
            let s = (hi - lo) / range;
            scale.push(s);
            min.push(lo - dmin * s);
        }
        let transform = FittedTransform::MinMax { scale, min };
        transform.validate()?;
        Ok(transform)
    }

    /// Number of columns the transform was fit on
    pub fn dimension(&self) -> usize {
        match self {
            FittedTransform::MinMax { scale, .. } | FittedTransform::Standard { scale, .. } => {
                scale.len()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let (scale, offset, offset_name) = match self {
            FittedTransform::MinMax { scale, min } => (scale, min, "min"),
            FittedTransform::Standard { mean, scale } => (scale, mean, "mean"),
        };
        if scale.is_empty() {
            return Err(ForecastError::artifact("transform has no columns"));
        }
        if scale.len() != offset.len() {
            return Err(ForecastError::artifact(format!(
                "scale has {} columns but {offset_name} has {}",
                scale.len(),
                offset.len()
            )));
        }
        if let Some(col) = scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(ForecastError::artifact(format!(
                "column {col} has a zero or non-finite scale"
            )));
        }
        if let Some(col) = offset.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::artifact(format!(
                "column {col} has a non-finite {offset_name}"
            )));
        }
        Ok(())
    }

    fn forward(&self, column: usize, x: f64) -> f64 {
        match self {
            FittedTransform::MinMax { scale, min } => x * scale[column] + min[column],
            FittedTransform::Standard { mean, scale } => (x - mean[column]) / scale[column],
        }
    }

    fn inverse(&self, column: usize, y: f64) -> f64 {
        match self {
            FittedTransform::MinMax { scale, min } => (y - min[column]) / scale[column],
            FittedTransform::Standard { mean, scale } => y * scale[column] + mean[column],
        }
    }
}

/// On-disk scaler artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    /// Column names in fit order; required for the feature scaler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub transform: FittedTransform,
}

impl ScalerArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::artifact(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ForecastError::artifact(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

/// Feature and target scalers fit alongside the model
#[derive(Debug, Clone)]
pub struct ScalerAdapter {
    feature_names: Vec<String>,
    features: FittedTransform,
    target: FittedTransform,
}

impl ScalerAdapter {
    pub fn new(
        feature_names: Vec<String>,
        features: FittedTransform,
        target: FittedTransform,
    ) -> Result<Self> {
        features.validate()?;
        target.validate()?;
        if features.dimension() != feature_names.len() {
            return Err(ForecastError::artifact(format!(
                "feature scaler has {} columns but declares {} feature names",
                features.dimension(),
                feature_names.len()
            )));
        }
        if target.dimension() != 1 {
            return Err(ForecastError::artifact(format!(
                "target scaler must have exactly one column, found {}",
                target.dimension()
            )));
        }
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Load both scalers from their JSON artifacts
    pub fn from_files(feature_path: &Path, target_path: &Path) -> Result<Self> {
        let feature = ScalerArtifact::load(feature_path)?;
        let target = ScalerArtifact::load(target_path)?;
        let feature_names = feature.feature_names.ok_or_else(|| {
            ForecastError::artifact(format!(
                "{} does not declare feature_names",
                feature_path.display()
            ))
        })?;
        let adapter = Self::new(feature_names, feature.transform, target.transform)?;
        debug!(
            features = adapter.feature_names.len(),
            "Loaded feature and target scalers"
        );
        Ok(adapter)
    }

    /// Feature names in the order the scaler was fit on
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn scale_features(&self, vector: &ExogenousVector) -> Result<NormalizedVector> {
        let expected = self.features.dimension();
        if vector.len() != expected {
            return Err(ForecastError::ShapeMismatch {
                expected,
                got: vector.len(),
            });
        }
        Ok(NormalizedVector::new(
            vector
                .values()
                .iter()
                .enumerate()
                .map(|(col, &x)| self.features.forward(col, x))
                .collect(),
        ))
    }

    pub fn scale_target(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.target.forward(0, x)).collect()
    }

    pub fn unscale_target(&self, value: f64) -> f64 {
        self.target.inverse(0, value)
    }
}
