//! Observability infrastructure for the predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, model load latency, outcomes by band and stage)
//! - Structured JSON logging with tracing

use crate::error::ErrorKind;
use crate::models::{Band, ModelInfo};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, register_int_gauge,
    GaugeVec, Histogram, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    model_load_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    model_loaded: IntGauge,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "eta_prediction_latency_seconds",
                "Time spent validating, running and classifying a prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            model_load_latency_seconds: register_histogram!(
                "eta_model_load_latency_seconds",
                "Time spent reading and decoding the model artifact",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_load_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "eta_predictions_total",
                "Predictions generated, by band",
                &["band"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "eta_prediction_errors_total",
                "Failed predictions, by failing stage",
                &["stage"]
            )
            .expect("Failed to register prediction_errors_total"),

            model_loaded: register_int_gauge!(
                "eta_model_loaded",
                "1 when a usable model is loaded, 0 otherwise"
            )
            .expect("Failed to register model_loaded"),

            model_info: register_gauge_vec!(
                "eta_model_info",
                "Information about the currently loaded model",
                &["format", "version"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_model_load_latency(&self, duration_secs: f64) {
        self.inner().model_load_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, band: Band) {
        self.inner()
            .predictions_total
            .with_label_values(&[band.as_str()])
            .inc();
    }

    pub fn inc_prediction_errors(&self, stage: ErrorKind) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[stage.as_str()])
            .inc();
    }

    /// Record the loaded model, or its absence
    pub fn set_model(&self, info: Option<&ModelInfo>) {
        let inner = self.inner();
        inner.model_info.reset();
        match info {
            Some(info) => {
                inner.model_loaded.set(1);
                let format = info.format.to_string();
                let version = info.version.as_deref().unwrap_or("unversioned");
                inner
                    .model_info
                    .with_label_values(&[format.as_str(), version])
                    .set(1.0);
            }
            None => inner.model_loaded.set(0),
        }
    }
}

/// Structured logger for predictor events
///
/// Provides consistent JSON-formatted logging for model loads,
/// predictions and server lifecycle.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("eta")
    }
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a successful model load
    pub fn log_model_loaded(&self, info: &ModelInfo, elapsed_ms: u128) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            path = %info.path.display(),
            format = %info.format,
            version = ?info.version,
            checksum = %info.checksum,
            size_bytes = info.size_bytes,
            elapsed_ms = elapsed_ms,
            "Model artifact loaded"
        );
    }

    /// Log a failed model load
    pub fn log_model_load_failed(&self, stage: ErrorKind, details: &str) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            stage = %stage.as_str(),
            details = %details,
            "Model artifact could not be loaded, prediction disabled"
        );
    }

    /// Log a prediction generation event
    pub fn log_prediction(&self, duration_minutes: f64, band: Band, elapsed_us: u128) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            duration_minutes = duration_minutes,
            band = %band,
            elapsed_us = elapsed_us,
            "Generated delivery time prediction"
        );
    }

    /// Log a request that did not produce a prediction
    pub fn log_rejected(&self, stage: ErrorKind, field: Option<&str>, details: &str) {
        if stage.is_blocking() {
            warn!(
                event = "prediction_rejected",
                instance = %self.instance,
                stage = %stage.as_str(),
                details = %details,
                "Prediction unavailable"
            );
        } else {
            info!(
                event = "prediction_rejected",
                instance = %self.instance,
                stage = %stage.as_str(),
                field = ?field,
                details = %details,
                "Prediction request rejected"
            );
        }
    }

    /// Log server startup
    pub fn log_startup(&self, version: &str, model_path: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            server_version = %version,
            model_path = %model_path,
            "Prediction server started"
        );
    }

    /// Log server shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction server shutting down"
        );
    }
}
