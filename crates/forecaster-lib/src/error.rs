//! Error types for forecasting and usage reporting

use thiserror::Error;

/// Result type alias for forecaster operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while serving a forecast or a usage report.
///
/// Every variant is local to a single request. None of them is retried: the
/// inputs that produced them are deterministic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Malformed or missing request fields.
    #[error("{0}")]
    Validation(String),

    /// Exogenous vector dimensionality disagrees with the fitted scaler.
    #[error("shape mismatch: expected {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Historical source holds fewer readings than the window length.
    #[error("Not enough historical data. Required: {required}, Found: {found}")]
    InsufficientHistory { required: usize, found: usize },

    /// Tabular source lacks an expected column.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// The predictive model failed for any reason.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Requested data does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A data source could not be read or parsed.
    #[error("data source error: {0}")]
    DataSource(String),

    /// A fitted artifact is malformed or unreadable.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// A chart could not be drawn or encoded.
    #[error("chart rendering failed: {0}")]
    Render(String),
}

/// HTTP-agnostic classification of a [`ForecastError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ShapeMismatch,
    InsufficientHistory,
    MissingColumn,
    ModelInvocation,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Stable label used for metrics and structured logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::MissingColumn => "missing_column",
            ErrorKind::ModelInvocation => "model_invocation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        }
    }

    /// True for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::ShapeMismatch | ErrorKind::NotFound
        )
    }
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::Validation(_) => ErrorKind::Validation,
            ForecastError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            ForecastError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            ForecastError::MissingColumn(_) => ErrorKind::MissingColumn,
            ForecastError::ModelInvocation(_) => ErrorKind::ModelInvocation,
            ForecastError::NotFound(_) => ErrorKind::NotFound,
            ForecastError::DataSource(_)
            | ForecastError::Artifact(_)
            | ForecastError::Render(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ForecastError::Validation(message.into())
    }

    pub(crate) fn model(message: impl std::fmt::Display) -> Self {
        ForecastError::ModelInvocation(message.to_string())
    }

    pub(crate) fn data_source(message: impl std::fmt::Display) -> Self {
        ForecastError::DataSource(message.to_string())
    }

    pub(crate) fn artifact(message: impl std::fmt::Display) -> Self {
        ForecastError::Artifact(message.to_string())
    }

    pub(crate) fn render(message: impl std::fmt::Display) -> Self {
        ForecastError::Render(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_message() {
        let err = ForecastError::InsufficientHistory {
            required: 72,
            found: 10,
        };
        assert_eq!(
            err.to_string(),
            "Not enough historical data. Required: 72, Found: 10"
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientHistory);
    }

    #[test]
    fn test_kind_classification() {
        assert!(ForecastError::validation("bad horizon").kind().is_client_error());
        assert!(ForecastError::ShapeMismatch { expected: 11, got: 10 }
            .kind()
            .is_client_error());
        assert!(!ForecastError::model("boom").kind().is_client_error());
        assert_eq!(ForecastError::artifact("x").kind(), ErrorKind::Internal);
        assert_eq!(ForecastError::data_source("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_labels_are_snake_case() {
        assert_eq!(ErrorKind::ModelInvocation.as_str(), "model_invocation");
        assert_eq!(ErrorKind::MissingColumn.as_str(), "missing_column");
    }
}
