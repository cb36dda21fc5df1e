//! Server health and readiness command

use anyhow::{bail, Result};
use colored::Colorize;
use eta_lib::{HealthResponse, ReadinessResponse};
use serde_json::json;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_rows, print_success, OutputFormat};

/// Row for the components table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Show server health and readiness; fails when the server is not ready
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.probe("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "health": health,
            "readiness": readiness,
        }))?,
        OutputFormat::Table => {
            println!("{} {}", "Server:".bold(), color_status(health.status));

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(component.status),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_rows(rows);

            if readiness.ready {
                print_success("Ready to serve predictions");
            }
        }
    }

    if !readiness.ready {
        bail!(
            "Server is not ready: {}",
            readiness.reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}
