//! Historical consumption window loading

use crate::error::{ForecastError, Result};
use crate::models::ConsumptionWindow;
use crate::scaler::ScalerAdapter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Consumption column of the community dataset
pub const DEFAULT_CONSUMPTION_COLUMN: &str = "Use [kW]";

/// Ordered source of raw historical consumption readings
pub trait HistorySource: Send + Sync {
    /// Every reading in the source, oldest first, in raw units
    fn read_series(&self) -> Result<Vec<f64>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// History read from one column of a CSV file.
///
/// The file is re-read on every call so appended rows are picked up
/// without a restart.
#[derive(Debug, Clone)]
pub struct CsvHistorySource {
    path: PathBuf,
    column: String,
}

impl CsvHistorySource {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySource for CsvHistorySource {
    fn read_series(&self) -> Result<Vec<f64>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            ForecastError::data_source(format!("failed to open {}: {e}", self.path.display()))
        })?;
        let column = reader
            .headers()
            .map_err(ForecastError::data_source)?
            .iter()
            .position(|h| h.trim() == self.column)
            .ok_or_else(|| ForecastError::MissingColumn(self.column.clone()))?;

        let mut series = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(ForecastError::data_source)?;
            let cell = record.get(column).unwrap_or("").trim();
            let value = cell.parse::<f64>().map_err(|_| {
                ForecastError::data_source(format!(
                    "row {}: '{cell}' in column '{}' is not a number",
                    row + 2,
                    self.column
                ))
            })?;
            series.push(value);
        }
        Ok(series)
    }

    fn describe(&self) -> String {
        format!("{} [{}]", self.path.display(), self.column)
    }
}

/// Fixed in-memory history
#[derive(Debug, Clone, Default)]
pub struct StaticHistory(pub Vec<f64>);

impl HistorySource for StaticHistory {
    fn read_series(&self) -> Result<Vec<f64>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("static history ({} readings)", self.0.len())
    }
}

/// Take the last `length` readings of `source` and scale them.
///
/// Fails with `InsufficientHistory` rather than returning a shorter window.
pub fn load_window<S: HistorySource + ?Sized>(
    source: &S,
    length: usize,
    scaler: &ScalerAdapter,
) -> Result<ConsumptionWindow> {
    let series = source.read_series()?;
    if series.len() < length {
        return Err(ForecastError::InsufficientHistory {
            required: length,
            found: series.len(),
        });
    }
    let tail = &series[series.len() - length..];
    debug!(
        source = %source.describe(),
        available = series.len(),
        window = length,
        "Loaded historical window"
    );
    ConsumptionWindow::new(scaler.scale_target(tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FEATURE_ORDER;
    use crate::scaler::FittedTransform;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn scaler() -> ScalerAdapter {
        let n = FEATURE_ORDER.len();
        ScalerAdapter::new(
            FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            FittedTransform::Standard {
                mean: vec![0.0; n],
                scale: vec![1.0; n],
            },
            FittedTransform::MinMax {
                scale: vec![0.5],
                min: vec![0.0],
            },
        )
        .unwrap()
    }

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_window_keeps_last_readings_scaled() {
        let history = StaticHistory((1..=10).map(f64::from).collect());
        let window = load_window(&history, 4, &scaler()).unwrap();
        assert_eq!(window.values(), &[3.5, 4.0, 4.5, 5.0]);
    }

    #[test]
    fn test_exact_length_history_is_enough() {
        let history = StaticHistory(vec![2.0, 4.0]);
        let window = load_window(&history, 2, &scaler()).unwrap();
        assert_eq!(window.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_insufficient_history() {
        let history = StaticHistory(vec![1.0; 71]);
        assert_eq!(
            load_window(&history, 72, &scaler()),
            Err(ForecastError::InsufficientHistory {
                required: 72,
                found: 71
            })
        );
    }

    #[test]
    fn test_csv_source_reads_named_column() {
        let file = write_csv(
            "Date & Time,Use [kW],Gen [kW]\n\
             2016-01-01 00:00,1.5,0.0\n\
             2016-01-01 01:00,2.5,0.1\n\
             2016-01-01 02:00, 3.0 ,0.2\n",
        );
        let source = CsvHistorySource::new(file.path(), DEFAULT_CONSUMPTION_COLUMN);
        assert_eq!(source.read_series().unwrap(), vec![1.5, 2.5, 3.0]);
    }

    #[test]
    fn test_csv_source_missing_column() {
        let file = write_csv("Date & Time,Gen [kW]\n2016-01-01 00:00,0.0\n");
        let source = CsvHistorySource::new(file.path(), DEFAULT_CONSUMPTION_COLUMN);
        assert_eq!(
            source.read_series(),
            Err(ForecastError::MissingColumn("Use [kW]".to_string()))
        );
    }

    #[test]
    fn test_csv_source_bad_cell() {
        let file = write_csv("Use [kW]\n1.0\nn/a\n");
        let source = CsvHistorySource::new(file.path(), DEFAULT_CONSUMPTION_COLUMN);
        match source.read_series() {
            Err(ForecastError::DataSource(msg)) => assert!(msg.contains("row 3"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_csv_source_missing_file() {
        let source = CsvHistorySource::new("/nonexistent/history.csv", "Use [kW]");
        assert!(matches!(
            source.read_series(),
            Err(ForecastError::DataSource(_))
        ));
    }
}
