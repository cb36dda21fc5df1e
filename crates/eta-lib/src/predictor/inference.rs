//! ONNX inference using tract
//!
//! Runs a regression graph exported to ONNX. The graph takes one `f32`
//! tensor of shape `[1, 7]` in schema column order, with categorical
//! columns ordinally encoded, and yields the duration as its first output.

use super::features::{FeatureRow, SCHEMA_COLUMNS};
use super::Regressor;
use anyhow::{Context, Result};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Number of input features expected by the model
const NUM_FEATURES: usize = SCHEMA_COLUMNS.len();

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-based regressor using tract for lightweight inference
pub struct OnnxRegressor {
    model: TractModel,
}

impl OnnxRegressor {
    /// Load and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok(Self { model })
    }

    /// Convert a feature row to tensor input
    fn row_to_tensor(row: &FeatureRow) -> Result<Tensor> {
        let array = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), row.to_f32_vec())
            .context("Feature row does not match the model input shape")?;
        Ok(array.into())
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        let start = Instant::now();
        let input = Self::row_to_tensor(row)?;

        let result = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX model execution failed")?;
        let output = result.first().context("No output from model")?;
        let value = output
            .to_array_view::<f32>()
            .context("Model output is not an f32 tensor")?
            .iter()
            .next()
            .copied()
            .context("Model output is empty")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(value as f64)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}
