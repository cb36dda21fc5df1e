//! Model registry
//!
//! Loads the model artifact at most once per registry and hands the same
//! [`ModelHandle`] to every caller. Concurrent first access is serialized by
//! a one-shot cell: exactly one load runs and all callers observe its
//! outcome, success or failure. Reads after initialization take no lock.

use super::features::FeatureRow;
use super::inference::OnnxRegressor;
use super::tabular::TabularModel;
use super::Regressor;
use crate::error::LoadError;
use crate::models::{ModelFormat, ModelInfo};
use crate::observability::{ServiceMetrics, StructuredLogger};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fmt;
use std::io::ErrorKind as IoErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

/// A model decoded from artifact bytes
pub struct DecodedModel {
    pub regressor: Box<dyn Regressor>,
    pub format: ModelFormat,
    pub version: Option<String>,
}

/// Turns artifact bytes into a usable model
pub trait ArtifactDecoder: Send + Sync {
    fn decode(&self, path: &Path, bytes: &[u8]) -> Result<DecodedModel>;
}

/// Decoder for the built-in formats.
///
/// Selects by file extension (`.onnx`, `.json`), falling back to sniffing
/// the content: a document starting with `{` is JSON, anything else is
/// tried as ONNX.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl DefaultDecoder {
    fn looks_like_json(bytes: &[u8]) -> bool {
        bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .map(|b| *b == b'{')
            .unwrap_or(false)
    }
}

impl ArtifactDecoder for DefaultDecoder {
    fn decode(&self, path: &Path, bytes: &[u8]) -> Result<DecodedModel> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let is_json = match extension.as_deref() {
            Some("json") => true,
            Some("onnx") => false,
            _ => Self::looks_like_json(bytes),
        };

        if is_json {
            let model = TabularModel::from_json(bytes)?;
            let format = match model {
                TabularModel::Linear(_) => ModelFormat::Linear,
                TabularModel::Forest(_) => ModelFormat::Forest,
            };
            let version = model.version().map(str::to_string);
            Ok(DecodedModel {
                regressor: Box::new(model),
                format,
                version,
            })
        } else {
            let model = OnnxRegressor::from_bytes(bytes)?;
            Ok(DecodedModel {
                regressor: Box::new(model),
                format: ModelFormat::Onnx,
                version: None,
            })
        }
    }
}

/// Loaded model shared read-only for the registry's lifetime
pub struct ModelHandle {
    regressor: Box<dyn Regressor>,
    info: ModelInfo,
}

impl ModelHandle {
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn kind(&self) -> &'static str {
        self.regressor.kind()
    }

    /// Run the model on one row. Panics inside the model become errors.
    pub fn predict(&self, row: &FeatureRow) -> Result<f64> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.regressor.predict(row))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "Model panicked during inference: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.regressor.kind())
            .field("info", &self.info)
            .finish()
    }
}

/// Registry owning the single model instance
pub struct ModelRegistry {
    path: PathBuf,
    decoder: Box<dyn ArtifactDecoder>,
    slot: OnceLock<Result<Arc<ModelHandle>, LoadError>>,
    load_attempts: AtomicU64,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl ModelRegistry {
    /// Create a registry for the artifact at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_decoder(path, DefaultDecoder)
    }

    /// Create a registry with a custom artifact decoder
    pub fn with_decoder(path: impl Into<PathBuf>, decoder: impl ArtifactDecoder + 'static) -> Self {
        Self {
            path: path.into(),
            decoder: Box::new(decoder),
            slot: OnceLock::new(),
            load_attempts: AtomicU64::new(0),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the model, loading it on first call.
    ///
    /// The outcome of the first load is cached: later calls return the same
    /// handle, or the same failure, without touching the filesystem.
    pub fn get_model(&self) -> Result<Arc<ModelHandle>, LoadError> {
        self.slot.get_or_init(|| self.load()).clone()
    }

    /// Outcome of the load, if one has happened
    pub fn peek(&self) -> Option<Result<Arc<ModelHandle>, LoadError>> {
        self.slot.get().cloned()
    }

    /// Number of times the artifact has been read (0 or 1)
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::SeqCst)
    }

    fn load(&self) -> Result<Arc<ModelHandle>, LoadError> {
        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        debug!(path = %self.path.display(), "Loading model artifact");

        let outcome = self.read_and_decode();
        let elapsed = start.elapsed();
        self.metrics.observe_model_load_latency(elapsed.as_secs_f64());

        match &outcome {
            Ok(handle) => {
                self.metrics.set_model(Some(handle.info()));
                self.logger.log_model_loaded(handle.info(), elapsed.as_millis());
            }
            Err(err) => {
                self.metrics.set_model(None);
                self.logger.log_model_load_failed(err.kind(), &err.to_string());
            }
        }
        outcome
    }

    fn read_and_decode(&self) -> Result<Arc<ModelHandle>, LoadError> {
        let bytes = std::fs::read(&self.path).map_err(|e| LoadError::Unavailable {
            path: self.path.clone(),
            reason: match e.kind() {
                IoErrorKind::NotFound => "file not found".to_string(),
                _ => e.to_string(),
            },
        })?;

        let corrupt = |reason: String| LoadError::Corrupt {
            path: self.path.clone(),
            reason,
        };

        let decoded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.decoder
                .decode(&self.path, &bytes)
                .with_context(|| format!("Failed to decode {}", self.path.display()))
        }))
        .map_err(|payload| {
            corrupt(format!(
                "decoder panicked: {}",
                panic_message(payload.as_ref())
            ))
        })?
        .map_err(|e| corrupt(format!("{:#}", e)))?;

        let info = ModelInfo {
            path: self.path.clone(),
            format: decoded.format,
            version: decoded.version,
            checksum: hex::encode(Sha256::digest(&bytes)),
            size_bytes: bytes.len(),
            loaded_at: chrono::Utc::now().timestamp(),
        };

        Ok(Arc::new(ModelHandle {
            regressor: decoded.regressor,
            info,
        }))
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("path", &self.path)
            .field("loaded", &self.slot.get().map(|r| r.is_ok()))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
