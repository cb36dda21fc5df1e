//! Prediction service
//!
//! validate -> fetch model -> invoke -> classify. Stateless per call apart
//! from the registry's cached model handle.

use super::features::{FeatureRow, FeatureValidator, FieldSpec, RawFields};
use super::output::OutputFormatter;
use super::registry::ModelRegistry;
use super::FeatureBounds;
use crate::error::PredictionError;
use crate::models::{FeatureRecord, ModelInfo, PredictionResult};
use crate::observability::{ServiceMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Instant;

/// Validates feature records and runs them through the registry's model
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    validator: FeatureValidator,
    formatter: OutputFormatter,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            validator: FeatureValidator::default(),
            formatter: OutputFormatter::new(),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    /// Override the accepted numeric input domain
    pub fn with_bounds(mut self, bounds: FeatureBounds) -> Self {
        self.validator = FeatureValidator::new(bounds);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Field specifications a form can render
    pub fn schema(&self) -> Vec<FieldSpec> {
        self.validator.schema()
    }

    /// Predict from raw form values
    pub fn predict(&self, raw: &RawFields) -> Result<PredictionResult, PredictionError> {
        let start = Instant::now();
        let outcome = self
            .validator
            .validate(raw)
            .and_then(|record| self.run(&record));
        self.finish(outcome, start)
    }

    /// Predict from an already typed record; bounds are still enforced
    pub fn predict_record(
        &self,
        record: &FeatureRecord,
    ) -> Result<PredictionResult, PredictionError> {
        let start = Instant::now();
        let outcome = self
            .validator
            .check_record(record)
            .and_then(|_| self.run(record));
        self.finish(outcome, start)
    }

    /// Metadata of the loaded model, loading it if needed
    pub fn model_info(&self) -> Result<ModelInfo, PredictionError> {
        let model = self.registry.get_model()?;
        Ok(model.info().clone())
    }

    fn run(&self, record: &FeatureRecord) -> Result<PredictionResult, PredictionError> {
        let model = self.registry.get_model()?;
        let row = FeatureRow::from_record(record);
        let raw_output = model.predict(&row).map_err(PredictionError::failed)?;
        self.formatter
            .format(raw_output)
            .map_err(PredictionError::failed)
    }

    fn finish(
        &self,
        outcome: Result<PredictionResult, PredictionError>,
        start: Instant,
    ) -> Result<PredictionResult, PredictionError> {
        let elapsed = start.elapsed();
        match &outcome {
            Ok(result) => {
                self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
                self.metrics.inc_predictions(result.band);
                self.logger
                    .log_prediction(result.duration_minutes, result.band, elapsed.as_micros());
            }
            Err(err) => {
                self.metrics.inc_prediction_errors(err.kind());
                self.logger
                    .log_rejected(err.kind(), err.field(), &err.to_string());
            }
        }
        outcome
    }
}
