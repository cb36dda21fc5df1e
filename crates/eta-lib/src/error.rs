//! Typed failures for the inference-serving boundary
//!
//! Every failure surfaced to a caller belongs to one of four stages. The
//! model-stage failures block prediction until an operator fixes the
//! artifact; the request-stage failures are per-call and retryable.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by [`PredictionError::PredictionFailed`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ModelUnavailable,
    ModelCorrupt,
    InvalidFeatureRecord,
    PredictionFailed,
}

impl ErrorKind {
    /// Model-stage failures disable the predict action entirely
    pub fn is_blocking(&self) -> bool {
        matches!(self, ErrorKind::ModelUnavailable | ErrorKind::ModelCorrupt)
    }

    /// Label used for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::ModelCorrupt => "model_corrupt",
            ErrorKind::InvalidFeatureRecord => "invalid_feature_record",
            ErrorKind::PredictionFailed => "prediction_failed",
        }
    }
}

/// Failure to produce a usable model from the configured artifact.
///
/// Cloneable so the registry can cache it and hand the same failure to
/// every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("model artifact not available at {path:?}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("model artifact at {path:?} could not be decoded: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Unavailable { .. } => ErrorKind::ModelUnavailable,
            LoadError::Corrupt { .. } => ErrorKind::ModelCorrupt,
        }
    }
}

/// Error returned by [`crate::predictor::PredictionService::predict`]
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model artifact not available at {path:?}: {reason}")]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("model artifact at {path:?} could not be decoded: {reason}")]
    ModelCorrupt { path: PathBuf, reason: String },

    #[error("invalid value for field `{field}`: {reason}")]
    InvalidFeatureRecord { field: String, reason: String },

    #[error("prediction failed: {detail}")]
    PredictionFailed {
        detail: String,
        #[source]
        source: BoxError,
    },
}

impl PredictionError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictionError::InvalidFeatureRecord {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a model invocation failure, keeping the full cause chain
    pub fn failed(err: anyhow::Error) -> Self {
        PredictionError::PredictionFailed {
            detail: format!("{:#}", err),
            source: err.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            PredictionError::ModelCorrupt { .. } => ErrorKind::ModelCorrupt,
            PredictionError::InvalidFeatureRecord { .. } => ErrorKind::InvalidFeatureRecord,
            PredictionError::PredictionFailed { .. } => ErrorKind::PredictionFailed,
        }
    }

    /// Offending field for input validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            PredictionError::InvalidFeatureRecord { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            stage: self.kind(),
            detail: self.to_string(),
            field: self.field().map(str::to_string),
        }
    }
}

impl From<LoadError> for PredictionError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Unavailable { path, reason } => {
                PredictionError::ModelUnavailable { path, reason }
            }
            LoadError::Corrupt { path, reason } => PredictionError::ModelCorrupt { path, reason },
        }
    }
}

/// Response-boundary form of a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub stage: ErrorKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
