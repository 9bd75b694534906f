//! Forecaster configuration

use anyhow::{bail, Result};
use forecaster_lib::history::DEFAULT_CONSUMPTION_COLUMN;
use forecaster_lib::models::DEFAULT_WINDOW_SIZE;
use forecaster_lib::service::DEFAULT_MAX_HORIZON;
use forecaster_lib::usage::DEFAULT_DATE_COLUMN;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "FORECASTER_CONFIG";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ForecasterConfig {
    /// Site label attached to structured log records
    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Expected hex SHA-256 of the model file
    #[serde(default)]
    pub model_sha256: Option<String>,

    #[serde(default = "default_model_version")]
    pub model_version: String,

    #[serde(default = "default_feature_scaler_path")]
    pub feature_scaler_path: PathBuf,

    #[serde(default = "default_target_scaler_path")]
    pub target_scaler_path: PathBuf,

    /// Community consumption history feeding the model window
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    #[serde(default = "default_consumption_column")]
    pub consumption_column: String,

    /// Directory of `<building>.csv` files for usage reports
    #[serde(default = "default_buildings_dir")]
    pub buildings_dir: PathBuf,

    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Largest accepted horizon; 0 disables the cap
    #[serde(default = "default_max_horizon")]
    pub max_horizon: u32,

    #[serde(default = "default_forecast_timeout_ms")]
    pub forecast_timeout_ms: u64,

    #[serde(default = "default_slow_inference_ms")]
    pub slow_inference_ms: u64,
}

fn default_site() -> String {
    "community".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_model_path() -> PathBuf {
    PathBuf::from("prediction_model_files/load_forecaster.onnx")
}

fn default_model_version() -> String {
    "v1".to_string()
}

fn default_feature_scaler_path() -> PathBuf {
    PathBuf::from("prediction_model_files/feature_scaler.json")
}

fn default_target_scaler_path() -> PathBuf {
    PathBuf::from("prediction_model_files/target_scaler.json")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("prediction_model_files/community_data.csv")
}

fn default_consumption_column() -> String {
    DEFAULT_CONSUMPTION_COLUMN.to_string()
}

fn default_buildings_dir() -> PathBuf {
    PathBuf::from("prediction_model_files/buildings")
}

fn default_date_column() -> String {
    DEFAULT_DATE_COLUMN.to_string()
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_max_horizon() -> u32 {
    DEFAULT_MAX_HORIZON
}

fn default_forecast_timeout_ms() -> u64 {
    10_000
}

fn default_slow_inference_ms() -> u64 {
    50
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            bind_address: default_bind_address(),
            port: default_port(),
            model_path: default_model_path(),
            model_sha256: None,
            model_version: default_model_version(),
            feature_scaler_path: default_feature_scaler_path(),
            target_scaler_path: default_target_scaler_path(),
            history_path: default_history_path(),
            consumption_column: default_consumption_column(),
            buildings_dir: default_buildings_dir(),
            date_column: default_date_column(),
            window_size: default_window_size(),
            max_horizon: default_max_horizon(),
            forecast_timeout_ms: default_forecast_timeout_ms(),
            slow_inference_ms: default_slow_inference_ms(),
        }
    }
}

impl ForecasterConfig {
    /// Load from the optional file named by `FORECASTER_CONFIG`, then
    /// `FORECASTER_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("FORECASTER").try_parsing(true))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            bail!("window_size must be at least 1");
        }
        if self.forecast_timeout_ms == 0 {
            bail!("forecast_timeout_ms must be positive");
        }
        if self.consumption_column.trim().is_empty() || self.date_column.trim().is_empty() {
            bail!("column names must not be empty");
        }
        Ok(())
    }

    pub fn max_horizon(&self) -> Option<u32> {
        (self.max_horizon > 0).then_some(self.max_horizon)
    }

    pub fn forecast_timeout(&self) -> Duration {
        Duration::from_millis(self.forecast_timeout_ms)
    }

    pub fn slow_inference(&self) -> Duration {
        Duration::from_millis(self.slow_inference_ms)
    }
}
