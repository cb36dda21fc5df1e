//! HTTP API for predictions, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use eta_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    predictor::{FieldSpec, PredictionService, RawFields},
    Band, ErrorDescriptor, ErrorKind, ModelInfo, PredictionError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, health_registry: HealthRegistry) -> Self {
        Self {
            service,
            health_registry,
        }
    }

    /// Load the model (if not yet loaded) and reflect the outcome in health
    pub async fn refresh_model_health(&self) -> Result<ModelInfo, PredictionError> {
        let registry = self.service.registry().clone();
        let outcome =
            run_blocking(move || Ok(registry.get_model().map(|model| model.info().clone())))
                .await?;

        self.health_registry.record_model_outcome(&outcome).await;
        outcome.map_err(PredictionError::from)
    }
}

/// Successful prediction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub duration_minutes: f64,
    pub band: Band,
    pub summary: String,
    pub model: ModelSummary,
}

/// Model details attached to each prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checksum: String,
}

impl From<&ModelInfo> for ModelSummary {
    fn from(info: &ModelInfo) -> Self {
        Self {
            format: info.format.to_string(),
            version: info.version.clone(),
            checksum: info.checksum.clone(),
        }
    }
}

/// Error response carrying the failing stage
pub struct ApiError(ErrorDescriptor);

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        ApiError(err.descriptor())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.stage {
            ErrorKind::ModelUnavailable | ErrorKind::ModelCorrupt => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::InvalidFeatureRecord => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::PredictionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0)).into_response()
    }
}

/// Run synchronous model work off the async runtime
async fn run_blocking<T, F>(work: F) -> Result<T, PredictionError>
where
    F: FnOnce() -> Result<T, PredictionError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(join_err) => {
            error!(error = %join_err, "Prediction task did not complete");
            Err(PredictionError::failed(anyhow::anyhow!(
                "prediction task did not complete: {}",
                join_err
            )))
        }
    }
}

/// Predict a delivery duration from raw form fields
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawFields>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(fields) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Rejected prediction request body");
        ApiError(ErrorDescriptor {
            stage: ErrorKind::InvalidFeatureRecord,
            detail: rejection.body_text(),
            field: None,
        })
    })?;

    let service = state.service.clone();
    let outcome = run_blocking(move || {
        let result = service.predict(&fields)?;
        let info = service.model_info()?;
        Ok((result, info))
    })
    .await;

    match outcome {
        Ok((result, info)) => {
            state.health_registry.clear_degraded(components::MODEL).await;
            Ok(Json(PredictResponse {
                duration_minutes: result.duration_minutes,
                band: result.band,
                summary: result.band.summary().to_string(),
                model: ModelSummary::from(&info),
            }))
        }
        Err(err) => {
            if err.kind().is_blocking() {
                state
                    .health_registry
                    .set_unhealthy(components::MODEL, err.to_string())
                    .await;
            } else if err.kind() == ErrorKind::PredictionFailed {
                state
                    .health_registry
                    .set_degraded(components::MODEL, err.to_string())
                    .await;
            }
            Err(err.into())
        }
    }
}

/// Metadata of the loaded model
async fn model(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfo>, ApiError> {
    Ok(Json(state.refresh_model_health().await?))
}

/// Feature schema for form rendering
async fn schema(State(state): State<Arc<AppState>>) -> Json<Vec<FieldSpec>> {
    Json(state.service.schema())
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/model", get(model))
        .route("/api/v1/schema", get(schema))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }
}
