//! Energy Consumption Forecaster CLI
//!
//! A command-line front end for requesting forecasts, building usage
//! reports and service health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use commands::{health, predict, usage};

/// Energy Consumption Forecaster CLI
#[derive(Parser)]
#[command(name = "efc")]
#[command(author, version, about = "CLI for the Energy Consumption Forecaster", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via EFC_API_URL env var)
    #[arg(long, env = "EFC_API_URL", default_value = "http://localhost:5001")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forecast consumption some hours ahead
    Predict(predict::PredictArgs),

    /// Show consumption metrics for a building
    Usage {
        /// Building name, as known to the service
        #[arg(long, short)]
        building: String,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,

        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
    },

    /// Show service and component health
    Health,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a date formatted as YYYY-MM-DD"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Predict(args) => {
            predict::run(&client, &args, cli.format).await?;
        }
        Commands::Usage {
            building,
            start,
            end,
        } => {
            usage::run(&client, &building, start, end, cli.format).await?;
        }
        Commands::Health => {
            health::run(&client, cli.format).await?;
        }
    }

    Ok(())
}
