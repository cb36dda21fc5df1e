//! Model metadata and feature schema commands

use anyhow::Result;
use colored::Colorize;
use eta_lib::{
    predictor::{FeatureValidator, FieldKind, FieldSpec},
    ModelInfo, ModelRegistry,
};
use std::path::Path;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{print_json, print_rows, DetailRow, OutputFormat};

/// Row for the schema table
#[derive(Tabled)]
struct SchemaRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
}

impl From<&FieldSpec> for SchemaRow {
    fn from(spec: &FieldSpec) -> Self {
        let (kind, allowed) = match &spec.kind {
            FieldKind::Real { min, max } => ("real", format!("{} to {}", min, max)),
            FieldKind::Integer { min, max } => ("integer", format!("{} to {}", min, max)),
            FieldKind::Category { options } => ("category", options.join(", ")),
        };
        Self {
            name: spec.name.clone(),
            kind: kind.to_string(),
            allowed,
        }
    }
}

/// Show metadata of the model the server has loaded
pub async fn show_model(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: ModelInfo = client.get("api/v1/model").await?;
    render_model(&info, format)
}

/// Load an artifact locally and show its metadata
pub fn show_local_model(path: &Path, format: OutputFormat) -> Result<()> {
    let registry = ModelRegistry::new(path);
    let model = registry.get_model()?;
    render_model(model.info(), format)
}

fn render_model(info: &ModelInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(info)?,
        OutputFormat::Table => {
            println!("{}", "Model".bold());
            let loaded_at = chrono::DateTime::from_timestamp(info.loaded_at, 0)
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| info.loaded_at.to_string());
            print_rows(vec![
                DetailRow::new("Path", info.path.display().to_string()),
                DetailRow::new("Format", info.format.to_string()),
                DetailRow::new("Version", info.version.as_deref().unwrap_or("-")),
                DetailRow::new("Checksum (sha256)", info.checksum.as_str()),
                DetailRow::new("Size", format!("{} bytes", info.size_bytes)),
                DetailRow::new("Loaded at", loaded_at),
            ]);
        }
    }
    Ok(())
}

/// Show the feature schema, from the server or from the built-in defaults
pub async fn show_schema(client: Option<&ApiClient>, format: OutputFormat) -> Result<()> {
    let schema: Vec<FieldSpec> = match client {
        Some(client) => client.get("api/v1/schema").await?,
        None => FeatureValidator::default().schema(),
    };

    match format {
        OutputFormat::Json => print_json(&schema)?,
        OutputFormat::Table => {
            println!("{}", "Feature Schema".bold());
            print_rows(schema.iter().map(SchemaRow::from).collect());
        }
    }
    Ok(())
}
