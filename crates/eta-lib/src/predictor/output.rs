//! Prediction output post-processing
//!
//! Turns the raw scalar returned by a model into a [`PredictionResult`]:
//! the duration is checked and floored at zero, then mapped to a band.

use crate::models::{Band, PredictionResult};
use anyhow::Result;

/// Durations below this are Fast
pub const FAST_BELOW_MINUTES: f64 = 30.0;

/// Durations below this (and not Fast) are Average
pub const AVERAGE_BELOW_MINUTES: f64 = 45.0;

/// Durations below this (and not Average) are Slow; everything above is VerySlow
pub const SLOW_BELOW_MINUTES: f64 = 60.0;

/// Map a duration to its band. Lower edges are inclusive.
pub fn classify(duration_minutes: f64) -> Band {
    if duration_minutes < FAST_BELOW_MINUTES {
        Band::Fast
    } else if duration_minutes < AVERAGE_BELOW_MINUTES {
        Band::Average
    } else if duration_minutes < SLOW_BELOW_MINUTES {
        Band::Slow
    } else {
        Band::VerySlow
    }
}

/// Formats raw model outputs into a PredictionResult
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Format a raw model output.
    ///
    /// Non-finite outputs are rejected; negative outputs are floored at zero
    /// so the returned duration is never negative.
    pub fn format(&self, raw_output: f64) -> Result<PredictionResult> {
        if !raw_output.is_finite() {
            anyhow::bail!("Model returned a non-finite duration ({})", raw_output);
        }
        // `<=` also maps -0.0 to +0.0
        let duration_minutes = if raw_output <= 0.0 { 0.0 } else { raw_output };
        Ok(PredictionResult {
            duration_minutes,
            band: classify(duration_minutes),
        })
    }
}
