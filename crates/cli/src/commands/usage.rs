//! Building usage report command

use anyhow::{bail, Result};
use chrono::NaiveDate;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{format_kw, print_json, print_rows, FieldRow, OutputFormat};

pub async fn run(
    client: &ApiClient,
    building: &str,
    start: NaiveDate,
    end: NaiveDate,
    format: OutputFormat,
) -> Result<()> {
    if start > end {
        bail!("--start ({start}) must not be after --end ({end})");
    }
    let start_date = start.format("%Y-%m-%d").to_string();
    let end_date = end.format("%Y-%m-%d").to_string();
    let report = client.usage(building, &start_date, &end_date).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Usage Report".bold());
            println!("Building: {}", building.cyan());
            println!("Period:   {start_date} .. {end_date}");
            let mut rows = vec![
                FieldRow::new("Total consumption", format!("{:.3} kWh", report.total_consumption)),
                FieldRow::new("Peak demand", format_kw(report.peak_demand)),
                FieldRow::new("Peak hour", report.peak_hour.clone()),
                FieldRow::new("Average consumption", format_kw(report.average_consumption)),
            ];
            if let Some(samples) = report.samples {
                rows.push(FieldRow::new("Samples", samples.to_string()));
            }
            if report.trend_graph.is_some() {
                rows.push(FieldRow::new("Trend graph", "PNG included in --format json"));
            }
            print_rows(rows);
        }
    }
    Ok(())
}
