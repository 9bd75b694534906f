//! Consumption forecast command

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::collections::HashMap;

use crate::client::{ApiClient, PredictRequest};
use crate::output::{format_kw, print_json, print_rows, FieldRow, OutputFormat};

/// Season, sent as a one-hot encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    #[value(alias = "fall")]
    Autumn,
}

impl Season {
    /// One-hot flags in `Winter, Spring, Summer, Fall` order
    fn one_hot(self) -> [(&'static str, f64); 4] {
        let flag = |season: Season| if self == season { 1.0 } else { 0.0 };
        [
            ("Winter", flag(Season::Winter)),
            ("Spring", flag(Season::Spring)),
            ("Summer", flag(Season::Summer)),
            ("Fall", flag(Season::Autumn)),
        ]
    }
}

#[derive(Debug, Clone, Args)]
pub struct PredictArgs {
    /// Hours past the latest reading to forecast
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub hours_ahead: u32,

    #[arg(long, value_enum)]
    pub season: Season,

    /// Outdoor temperature in °C
    #[arg(long, allow_hyphen_values = true)]
    pub outdoor_temp: f64,

    /// Relative humidity in percent
    #[arg(long)]
    pub humidity: f64,

    /// Cloud cover in percent
    #[arg(long)]
    pub cloud_cover: f64,

    /// Number of occupants
    #[arg(long)]
    pub occupancy: f64,

    /// Special equipment load in kW
    #[arg(long)]
    pub special_equipment: f64,

    /// Lighting load in kW
    #[arg(long)]
    pub lighting: f64,

    /// HVAC load in kW
    #[arg(long)]
    pub hvac: f64,
}

impl PredictArgs {
    pub fn to_request(&self) -> PredictRequest {
        let mut exogenous: HashMap<String, f64> = self
            .season
            .one_hot()
            .into_iter()
            .map(|(name, flag)| (name.to_string(), flag))
            .collect();
        for (name, value) in [
            ("Outdoor Temp (°C)", self.outdoor_temp),
            ("Humidity (%)", self.humidity),
            ("Cloud Cover (%)", self.cloud_cover),
            ("Occupancy", self.occupancy),
            ("Special Equipment [kW]", self.special_equipment),
            ("Lighting [kW]", self.lighting),
            ("HVAC [kW]", self.hvac),
        ] {
            exogenous.insert(name.to_string(), value);
        }
        PredictRequest {
            horizon: self.hours_ahead,
            exogenous,
        }
    }
}

pub async fn run(client: &ApiClient, args: &PredictArgs, format: OutputFormat) -> Result<()> {
    let prediction = client.predict(&args.to_request()).await?;

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => {
            println!("{}", "Consumption Forecast".bold());
            print_rows(vec![
                FieldRow::new("Hours ahead", args.hours_ahead.to_string()),
                FieldRow::new("Season", format!("{:?}", args.season)),
                FieldRow::new("Outdoor temp", format!("{:.1} °C", args.outdoor_temp)),
                FieldRow::new(
                    "Predicted consumption",
                    format_kw(prediction.predicted_consumption).green().to_string(),
                ),
            ]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(season: Season) -> PredictArgs {
        PredictArgs {
            hours_ahead: 12,
            season,
            outdoor_temp: -4.0,
            humidity: 80.0,
            cloud_cover: 40.0,
            occupancy: 3.0,
            special_equipment: 0.2,
            lighting: 0.1,
            hvac: 1.5,
        }
    }

    #[test]
    fn test_request_carries_every_feature() {
        let request = args(Season::Winter).to_request();
        assert_eq!(request.horizon, 12);
        assert_eq!(request.exogenous.len(), 11);
        assert_eq!(request.exogenous["Winter"], 1.0);
        assert_eq!(request.exogenous["Fall"], 0.0);
        assert_eq!(request.exogenous["Outdoor Temp (°C)"], -4.0);
        assert_eq!(request.exogenous["HVAC [kW]"], 1.5);
    }

    #[test]
    fn test_autumn_maps_to_fall() {
        let request = args(Season::Autumn).to_request();
        assert_eq!(request.exogenous["Fall"], 1.0);
        let hot: f64 = ["Winter", "Spring", "Summer", "Fall"]
            .iter()
            .map(|s| request.exogenous[*s])
            .sum();
        assert_eq!(hot, 1.0);
    }

    #[test]
    fn test_fall_alias_parses() {
        assert_eq!(Season::from_str("fall", true).unwrap(), Season::Autumn);
    }
}
