//! Delivery ETA Predictor CLI
//!
//! A command-line tool for estimating delivery times, either through the
//! prediction server or locally from a model artifact, and for inspecting
//! the server's model and health.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{model, predict, status};
use std::path::PathBuf;

/// Delivery ETA Predictor CLI
#[derive(Parser)]
#[command(name = "eta")]
#[command(author, version, about = "CLI for the Delivery ETA Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ETA_API_URL env var).
    /// Falls back to ~/.config/eta/config.json, then http://localhost:8080
    #[arg(long, env = "ETA_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate a delivery time
    Predict(predict::PredictArgs),

    /// Show metadata of the loaded model
    Model {
        /// Inspect this artifact locally instead of asking the server
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Show the feature schema
    Schema {
        /// Print the built-in schema without contacting the server
        #[arg(long)]
        offline: bool,
    },

    /// Show server health and readiness
    Status,
}

fn client(cli: &Cli) -> Result<client::ApiClient> {
    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url.clone());
    if cli.verbose {
        eprintln!("Using API at {}", api_url);
    }
    client::ApiClient::new(&api_url)
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Predict(args) => match &args.model {
            Some(path) => predict::predict_local(path, args, cli.format, cli.verbose)?,
            None => {
                predict::predict_remote(&client(&cli)?, args, cli.format, cli.verbose).await?
            }
        },
        Commands::Model { model: Some(path) } => {
            model::show_local_model(path, cli.format)?;
        }
        Commands::Model { model: None } => {
            model::show_model(&client(&cli)?, cli.format).await?;
        }
        Commands::Schema { offline: true } => {
            model::show_schema(None, cli.format).await?;
        }
        Commands::Schema { offline: false } => {
            model::show_schema(Some(&client(&cli)?), cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client(&cli)?, cli.format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
