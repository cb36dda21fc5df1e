//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Path of the serialized model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port for prediction, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Load the model at startup instead of on the first request
    #[serde(default = "default_warm_up")]
    pub warm_up: bool,

    /// Instance name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.onnx")
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_warm_up() -> bool {
    true
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "eta-server".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            log_format: default_log_format(),
            warm_up: default_warm_up(),
            instance_name: default_instance_name(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `eta-server` file and `ETA_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("eta-server")
    }

    /// Load configuration using `file_stem` as the optional config file name
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("ETA"))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }
}
