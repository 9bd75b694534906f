//! Service health command

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, print_info, print_json, print_rows, print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn run(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            match report.status.as_str() {
                "healthy" => print_success("Forecaster is healthy"),
                "degraded" => print_warning("Forecaster is degraded"),
                other => print_warning(&format!("Forecaster is {other}")),
            }
            if report.components.is_empty() {
                print_info("No components reported");
                return Ok(());
            }
            let rows: Vec<ComponentRow> = report
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            print_rows(rows);
        }
    }
    Ok(())
}
