//! Delivery time prediction library
//!
//! This crate provides the inference-serving boundary:
//! - Feature validation against the fixed delivery schema
//! - A load-once model registry (ONNX via tract, or JSON tabular models)
//! - Prediction and classification into qualitative bands
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{ErrorDescriptor, ErrorKind, LoadError, PredictionError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{ModelHandle, ModelRegistry, PredictionService, RawFields};
