//! Core data models for the forecaster

use crate::error::{ForecastError, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;

/// Canonical exogenous feature order the shipped scaler and model were fit on.
pub const FEATURE_ORDER: [&str; 11] = [
    "Winter",
    "Spring",
    "Summer",
    "Fall",
    "Outdoor Temp (°C)",
    "Humidity (%)",
    "Cloud Cover (%)",
    "Occupancy",
    "Special Equipment [kW]",
    "Lighting [kW]",
    "HVAC [kW]",
];

/// Window length used at training time (past 72 hours)
pub const DEFAULT_WINDOW_SIZE: usize = 72;

/// Raw exogenous conditions, ordered by the fitted scaler's schema
#[derive(Debug, Clone, PartialEq)]
pub struct ExogenousVector {
    values: Vec<f64>,
}

impl ExogenousVector {
    /// Build a vector from named inputs, in `schema` order.
    ///
    /// Every schema feature must be present and finite. Keys outside the
    /// schema are ignored.
    pub fn from_inputs(schema: &[String], inputs: &HashMap<String, f64>) -> Result<Self> {
        let missing: Vec<&str> = schema
            .iter()
            .filter(|name| !inputs.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::validation(format!(
                "Missing exogenous feature: {}",
                missing
                    .iter()
                    .map(|name| format!("'{name}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut values = Vec::with_capacity(schema.len());
        for name in schema {
            let value = inputs[name.as_str()];
            if !value.is_finite() {
                return Err(ForecastError::validation(format!(
                    "Exogenous feature '{name}' must be a finite number"
                )));
            }
            values.push(value);
        }
        Ok(Self { values })
    }

    /// Positional constructor; the scaler still checks dimensionality.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Exogenous vector in scaled (model) space
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVector(Vec<f64>);

impl NormalizedVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The most recent normalized consumption readings, oldest first.
///
/// Length is fixed at construction and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionWindow {
    values: Vec<f64>,
}

impl ConsumptionWindow {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::validation(
                "consumption window must hold at least one value",
            ));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Newest value in the window
    pub fn latest(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Drop the oldest value and append `value` as the newest.
    pub(crate) fn push_latest(&mut self, value: f64) {
        self.values.rotate_left(1);
        let last = self.values.len() - 1;
        self.values[last] = value;
    }
}

/// Number of one-hour steps to roll forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForecastHorizon(NonZeroU32);

impl ForecastHorizon {
    pub fn new(hours: i64) -> Result<Self> {
        u32::try_from(hours)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| {
                ForecastError::validation(format!(
                    "hours ahead must be a positive integer, got {hours}"
                ))
            })
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn steps(&self) -> usize {
        self.0.get() as usize
    }
}

/// Inbound forecast request.
///
/// `hours_ahead` / `user_inputs` are accepted for clients of the first
/// dashboard release. The horizon may arrive as an integer, a whole-valued
/// float (`5.0`) or a numeric string (`"5"`); fractional hours are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(alias = "hours_ahead", deserialize_with = "whole_hours")]
    pub horizon: i64,
    #[serde(alias = "user_inputs")]
    pub exogenous: HashMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHours {
    Integer(i64),
    Float(f64),
    Text(String),
}

fn whole_hours<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let hours = match RawHours::deserialize(deserializer)? {
        RawHours::Integer(hours) => return Ok(hours),
        RawHours::Float(hours) => hours,
        RawHours::Text(text) => {
            let trimmed = text.trim();
            if let Ok(hours) = trimmed.parse::<i64>() {
                return Ok(hours);
            }
            trimmed.parse::<f64>().map_err(|_| {
                D::Error::custom(format!("hours ahead must be a number, got '{text}'"))
            })?
        }
    };
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if hours.is_finite()
        && hours.fract() == 0.0
        && hours >= i64::MIN as f64
        && hours < i64::MAX as f64
    {
        Ok(hours as i64)
    } else {
        Err(D::Error::custom(format!(
            "hours ahead must be a whole number, got {hours}"
        )))
    }
}

/// Forecast result in raw consumption units (kW)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub predicted_consumption: f64,
}

/// Descriptive consumption metrics for one building over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub building: String,
    pub start_date: String,
    pub end_date: String,
    pub samples: usize,
    pub total_consumption: f64,
    pub peak_demand: f64,
    /// Hour of day (`HH:00`) with the highest mean consumption
    pub peak_hour: String,
    pub average_consumption: f64,
    /// Base64-encoded PNG of consumption across the range
    pub trend_graph: String,
}
