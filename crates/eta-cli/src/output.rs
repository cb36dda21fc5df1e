//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use eta_lib::{Band, ComponentStatus};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Two-column row for detail views
#[derive(Tabled)]
pub struct DetailRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl DetailRow {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Print a rounded table
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a duration in minutes
pub fn format_minutes(minutes: f64) -> String {
    format!("{:.1} min", minutes)
}

/// Color a band by how slow it is
pub fn color_band(band: Band) -> String {
    let label = band.as_str();
    match band {
        Band::Fast => label.green().bold().to_string(),
        Band::Average => label.cyan().bold().to_string(),
        Band::Slow => label.yellow().bold().to_string(),
        Band::VerySlow => label.red().bold().to_string(),
    }
}

pub fn color_status(status: ComponentStatus) -> String {
    match status {
        ComponentStatus::Healthy => "healthy".green().to_string(),
        ComponentStatus::Degraded => "degraded".yellow().to_string(),
        ComponentStatus::Unhealthy => "unhealthy".red().to_string(),
    }
}

/// Shorten a hex checksum for display
pub fn short_checksum(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
