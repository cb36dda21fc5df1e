//! ETA Server - delivery time prediction service
//!
//! Loads the pre-trained model once and serves predictions, health
//! probes and Prometheus metrics over HTTP.

use anyhow::Result;
use eta_lib::{
    health::{components, HealthRegistry},
    ModelRegistry, PredictionService, StructuredLogger,
};
use eta_server::{
    api,
    config::{LogFormat, ServerConfig},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    init_tracing(config.log_format);

    info!(model_path = %config.model_path.display(), "Starting eta-server");

    let logger = StructuredLogger::new(&config.instance_name);
    let registry = Arc::new(ModelRegistry::new(&config.model_path).with_logger(logger.clone()));
    let service = Arc::new(PredictionService::new(registry).with_logger(logger.clone()));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;
    health_registry.register(components::API).await;

    let app_state = Arc::new(api::AppState::new(service, health_registry.clone()));

    if config.warm_up {
        // A failed load keeps the server up: predictions answer 503 and readiness stays false
        if let Err(err) = app_state.refresh_model_health().await {
            warn!(error = %err, "Model warm-up failed");
        }
    }

    logger.log_startup(SERVER_VERSION, &config.model_path.display().to_string());
    health_registry.set_ready(true).await;

    api::serve(&config.listen_addr(), app_state).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
