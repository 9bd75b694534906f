//! Per-building usage reports
//!
//! Each building has a CSV file `<data_dir>/<building>.csv` with a timestamp
//! column and an energy column. A report aggregates every row whose
//! timestamp falls on a day in `[start, end]` and plots those rows as a
//! trend chart.

use crate::chart::{render_trend_png, TREND_HEIGHT, TREND_WIDTH};
use crate::error::{ForecastError, Result};
use crate::history::DEFAULT_CONSUMPTION_COLUMN;
use crate::models::UsageReport;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamp column of the building datasets
pub const DEFAULT_DATE_COLUMN: &str = "Date & Time";

/// Date format accepted for report bounds
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a `YYYY-MM-DD` report bound, naming the offending parameter on failure.
pub fn parse_query_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), QUERY_DATE_FORMAT).map_err(|_| {
        ForecastError::validation(format!(
            "{field} must be a date formatted as YYYY-MM-DD, got '{value}'"
        ))
    })
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Directory of building consumption files
#[derive(Debug, Clone)]
pub struct UsageSource {
    data_dir: PathBuf,
    date_column: String,
    energy_column: String,
}

impl UsageSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            energy_column: DEFAULT_CONSUMPTION_COLUMN.to_string(),
        }
    }

    pub fn with_columns(mut self, date_column: impl Into<String>, energy_column: impl Into<String>) -> Self {
        self.date_column = date_column.into();
        self.energy_column = energy_column.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_available(&self) -> bool {
        self.data_dir.is_dir()
    }

    fn building_path(&self, building: &str) -> Result<PathBuf> {
        let building = building.trim();
        if building.is_empty() {
            return Err(ForecastError::validation("building must not be empty"));
        }
        if building.contains(['/', '\\']) || building.contains("..") {
            return Err(ForecastError::validation(format!(
                "invalid building name '{building}'"
            )));
        }
        let path = self.data_dir.join(format!("{building}.csv"));
        if !path.is_file() {
            return Err(ForecastError::NotFound(format!(
                "Building '{building}' not found"
            )));
        }
        Ok(path)
    }

    /// Aggregate one building's consumption over the inclusive day range.
    pub fn report(&self, building: &str, start: NaiveDate, end: NaiveDate) -> Result<UsageReport> {
        if start > end {
            return Err(ForecastError::validation(format!(
                "start_date {start} is after end_date {end}"
            )));
        }
        let path = self.building_path(building)?;

        let mut reader = csv::Reader::from_path(&path).map_err(|e| {
            ForecastError::data_source(format!("failed to open {}: {e}", path.display()))
        })?;
        let headers = reader.headers().map_err(ForecastError::data_source)?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
        };
        let date_idx = position(&self.date_column)?;
        let energy_idx = position(&self.energy_column)?;

        let mut summary = UsageSummary::default();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(ForecastError::data_source)?;
            let line = row + 2;

            let raw_ts = record.get(date_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                ForecastError::data_source(format!("row {line}: unrecognized timestamp '{raw_ts}'"))
            })?;
            let day = timestamp.date();
            if day < start || day > end {
                continue;
            }

            let raw_energy = record.get(energy_idx).unwrap_or("").trim();
            let energy = raw_energy.parse::<f64>().map_err(|_| {
                ForecastError::data_source(format!(
                    "row {line}: '{raw_energy}' in column '{}' is not a number",
                    self.energy_column
                ))
            })?;
            summary.add(timestamp, energy);
        }

        debug!(
            building = %building,
            path = %path.display(),
            samples = summary.samples,
            "Aggregated building usage"
        );
        summary.into_report(building.trim(), start, end)
    }
}

#[derive(Default)]
struct UsageSummary {
    samples: usize,
    total: f64,
    peak: f64,
    hourly_sum: [f64; 24],
    hourly_count: [usize; 24],
    points: Vec<(NaiveDateTime, f64)>,
}

impl UsageSummary {
    fn add(&mut self, timestamp: NaiveDateTime, energy: f64) {
        if self.samples == 0 || energy > self.peak {
            self.peak = energy;
        }
        self.samples += 1;
        self.total += energy;
        let hour = timestamp.hour() as usize;
        self.hourly_sum[hour] += energy;
        self.hourly_count[hour] += 1;
        self.points.push((timestamp, energy));
    }

    /// Hour of day with the highest mean consumption; earliest wins ties.
    fn peak_hour(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for hour in 0..24 {
            if self.hourly_count[hour] == 0 {
                continue;
            }
            let mean = self.hourly_sum[hour] / self.hourly_count[hour] as f64;
            match best {
                Some((_, best_mean)) if mean <= best_mean => {}
                _ => best = Some((hour, mean)),
            }
        }
        best.map(|(hour, _)| hour)
    }

    fn into_report(self, building: &str, start: NaiveDate, end: NaiveDate) -> Result<UsageReport> {
        let peak_hour = self.peak_hour().ok_or_else(|| {
            ForecastError::NotFound(format!(
                "No data for building '{building}' between {start} and {end}"
            ))
        })?;
        let trend_graph = render_trend_png(&self.points, TREND_WIDTH, TREND_HEIGHT)?;
        Ok(UsageReport {
            building: building.to_string(),
            start_date: start.format(QUERY_DATE_FORMAT).to_string(),
            end_date: end.format(QUERY_DATE_FORMAT).to_string(),
            samples: self.samples,
            total_consumption: self.total,
            peak_demand: self.peak,
            peak_hour: format!("{peak_hour:02}:00"),
            average_consumption: self.total / self.samples as f64,
            trend_graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FIXTURE: &str = "\
Date & Time,Use [kW],Outdoor Temp (°C)
2024-01-01 00:00:00,1.0,3.0
2024-01-01 01:00:00,2.0,3.5
2024-01-01 18:00:00,5.0,2.0
2024-01-02 00:00:00,3.0,1.0
2024-01-02 18:00:00,4.0,0.5
2024-01-03 18:00:00,9.0,0.5
";

    fn source_with(building: &str, contents: &str) -> (TempDir, UsageSource) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(format!("{building}.csv")), contents).unwrap();
        let source = UsageSource::new(dir.path());
        (dir, source)
    }

    fn date(s: &str) -> NaiveDate {
        parse_query_date("date", s).unwrap()
    }

    #[test]
    fn test_report_over_inclusive_range() {
        let (_dir, source) = source_with("House 1", FIXTURE);
        let report = source
            .report("House 1", date("2024-01-01"), date("2024-01-02"))
            .unwrap();

        assert_eq!(report.samples, 5);
        assert!((report.total_consumption - 15.0).abs() < 1e-12);
        assert_eq!(report.peak_demand, 5.0);
        assert!((report.average_consumption - 3.0).abs() < 1e-12);
        // hour 18 averages 4.5, hour 0 averages 2.0
        assert_eq!(report.peak_hour, "18:00");
        assert_eq!(report.start_date, "2024-01-01");
        assert_eq!(report.end_date, "2024-01-02");
    }

    #[test]
    fn test_report_carries_trend_graph() {
        use base64::Engine as _;

        let (_dir, source) = source_with("House 1", FIXTURE);
        let report = source
            .report("House 1", date("2024-01-01"), date("2024-01-03"))
            .unwrap();
        let png = base64::engine::general_purpose::STANDARD
            .decode(&report.trend_graph)
            .unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (TREND_WIDTH, TREND_HEIGHT));
    }

    #[test]
    fn test_single_day_range() {
        let (_dir, source) = source_with("House 1", FIXTURE);
        let report = source
            .report("House 1", date("2024-01-03"), date("2024-01-03"))
            .unwrap();
        assert_eq!(report.samples, 1);
        assert_eq!(report.peak_demand, 9.0);
    }

    #[test]
    fn test_peak_hour_tie_goes_to_earliest() {
        let csv = "Date & Time,Use [kW]\n2024-03-01 07:00,2.0\n2024-03-01 05:00,2.0\n";
        let (_dir, source) = source_with("b", csv);
        let report = source
            .report("b", date("2024-03-01"), date("2024-03-01"))
            .unwrap();
        assert_eq!(report.peak_hour, "05:00");
    }

    #[test]
    fn test_unknown_building_is_not_found() {
        let (_dir, source) = source_with("House 1", FIXTURE);
        let err = source
            .report("House 9", date("2024-01-01"), date("2024-01-02"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::NotFound(_)));
    }

    #[test]
    fn test_empty_range_is_not_found() {
        let (_dir, source) = source_with("House 1", FIXTURE);
        let err = source
            .report("House 1", date("2025-01-01"), date("2025-01-31"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::NotFound(ref m) if m.contains("No data")));
    }

    #[test]
    fn test_missing_columns() {
        let (_dir, source) = source_with("b", "Timestamp,Use [kW]\n2024-01-01 00:00,1.0\n");
        let err = source
            .report("b", date("2024-01-01"), date("2024-01-01"))
            .unwrap_err();
        assert_eq!(err, ForecastError::MissingColumn("Date & Time".to_string()));

        let (_dir, source) = source_with("c", "Date & Time,kW\n2024-01-01 00:00,1.0\n");
        let err = source
            .report("c", date("2024-01-01"), date("2024-01-01"))
            .unwrap_err();
        assert_eq!(err, ForecastError::MissingColumn("Use [kW]".to_string()));
    }

    #[test]
    fn test_custom_columns() {
        let csv = "time,gen\n2024-01-01T10:00:00,0.5\n";
        let (_dir, source) = source_with("b", csv);
        let report = source
            .with_columns("time", "gen")
            .report("b", date("2024-01-01"), date("2024-01-01"))
            .unwrap();
        assert_eq!(report.peak_hour, "10:00");
    }

    #[test]
    fn test_rejects_path_traversal_and_reversed_range() {
        let (_dir, source) = source_with("House 1", FIXTURE);
        for name in ["../House 1", "a/b", "a\\b", "  "] {
            let err = source
                .report(name, date("2024-01-01"), date("2024-01-02"))
                .unwrap_err();
            assert!(matches!(err, ForecastError::Validation(_)), "{name}");
        }
        let err = source
            .report("House 1", date("2024-01-02"), date("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::Validation(_)));
    }

    #[test]
    fn test_bad_cells_are_data_source_errors() {
        let (_dir, source) = source_with("b", "Date & Time,Use [kW]\nyesterday,1.0\n");
        let err = source
            .report("b", date("2024-01-01"), date("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::DataSource(ref m) if m.contains("row 2")));
    }

    #[test]
    fn test_parse_query_date() {
        assert_eq!(
            parse_query_date("start_date", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        let err = parse_query_date("start_date", "02/29/2024").unwrap_err();
        assert!(matches!(err, ForecastError::Validation(ref m) if m.contains("start_date")));
    }
}
