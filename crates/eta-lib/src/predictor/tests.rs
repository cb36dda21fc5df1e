//! Integration tests for the predictor module
//!
//! These tests verify:
//! - Registry load-once semantics, including under concurrent first access
//! - Failure caching for missing and corrupt artifacts
//! - The validate -> invoke -> classify flow of the prediction service

use super::*;
use crate::error::ErrorKind;
use crate::models::{
    Band, FeatureRecord, ModelFormat, TimeOfDay, TrafficLevel, VehicleType, Weather,
};
use anyhow::Result;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tract_onnx::pb;

fn linear_model_json() -> serde_json::Value {
    json!({
        "format": "linear",
        "version": "test-1",
        "intercept": 5.0,
        "numeric": {
            "Distance_km": 2.0,
            "Preparation_Time_min": 1.0,
            "Courier_Experience_yrs": -0.5
        },
        "categorical": {
            "Weather": {"Clear": 0.0, "Rainy": 4.0, "Cloudy": 1.0, "Foggy": 5.0, "Windy": 2.0, "Snowy": 8.0},
            "Traffic_Level": {"Low": 0.0, "Medium": 3.0, "High": 9.0},
            "Time_of_Day": {"Morning": 0.0, "Afternoon": 1.0, "Evening": 2.0, "Night": 1.5},
            "Vehicle_Type": {"Bike": 2.0, "Scooter": 1.0, "Car": 0.5}
        }
    })
}

fn write_artifact(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn linear_artifact(dir: &TempDir) -> std::path::PathBuf {
    write_artifact(
        dir,
        "model.json",
        &serde_json::to_vec(&linear_model_json()).unwrap(),
    )
}

fn f32_value_info(name: &str, dims: &[i64]) -> pb::ValueInfoProto {
    let shape = pb::TensorShapeProto {
        dim: dims
            .iter()
            .map(|&d| pb::tensor_shape_proto::Dimension {
                value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(d)),
                ..Default::default()
            })
            .collect(),
    };
    pb::ValueInfoProto {
        name: name.to_string(),
        r#type: Some(pb::TypeProto {
            value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                elem_type: pb::tensor_proto::DataType::Float as i32,
                shape: Some(shape),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn f32_initializer(name: &str, dims: &[i64], values: &[f32]) -> pb::TensorProto {
    pb::TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: pb::tensor_proto::DataType::Float as i32,
        float_data: values.to_vec(),
        ..Default::default()
    }
}

fn graph_node(op_type: &str, inputs: &[&str], output: &str) -> pb::NodeProto {
    pb::NodeProto {
        name: output.to_string(),
        op_type: op_type.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: vec![output.to_string()],
        ..Default::default()
    }
}

/// Encoded ONNX graph computing `features x weights + bias`
pub(crate) fn linear_onnx_model(weights: [f32; 7], bias: f32) -> Vec<u8> {
    let graph = pb::GraphProto {
        name: "linear_eta".to_string(),
        node: vec![
            graph_node("MatMul", &["features", "weights"], "scaled"),
            graph_node("Add", &["scaled", "bias"], "duration"),
        ],
        initializer: vec![
            f32_initializer("weights", &[7, 1], &weights),
            f32_initializer("bias", &[1], &[bias]),
        ],
        input: vec![f32_value_info("features", &[1, 7])],
        output: vec![f32_value_info("duration", &[1, 1])],
        ..Default::default()
    };
    let model = pb::ModelProto {
        ir_version: 7,
        producer_name: "eta-tests".to_string(),
        opset_import: vec![pb::OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
        graph: Some(graph),
        ..Default::default()
    };
    prost::Message::encode_to_vec(&model)
}

/// Same coefficients as the linear JSON fixture, over ordinal codes
fn scenario_onnx_model() -> Vec<u8> {
    linear_onnx_model([2.0, 4.0, 3.0, 1.0, 0.5, 1.0, -0.5], 5.0)
}

pub(crate) fn scenario_fields() -> RawFields {
    serde_json::from_value(json!({
        "Distance_km": 10.0,
        "Weather": "Clear",
        "Traffic_Level": "Medium",
        "Time_of_Day": "Afternoon",
        "Vehicle_Type": "Car",
        "Preparation_Time_min": 15,
        "Courier_Experience_yrs": 3.0
    }))
    .unwrap()
}

pub(crate) fn scenario_record() -> FeatureRecord {
    FeatureRecord {
        distance_km: 10.0,
        weather: Weather::Clear,
        traffic_level: TrafficLevel::Medium,
        time_of_day: TimeOfDay::Afternoon,
        vehicle_type: VehicleType::Car,
        preparation_time_min: 15,
        courier_experience_yrs: 3.0,
    }
}

/// Regressor returning a fixed output and counting invocations
struct FixedRegressor {
    output: f64,
    calls: Arc<AtomicUsize>,
}

impl Regressor for FixedRegressor {
    fn predict(&self, _row: &FeatureRow) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output)
    }

    fn kind(&self) -> &'static str {
        "fixed"
    }
}

struct PanickingRegressor;

impl Regressor for PanickingRegressor {
    fn predict(&self, _row: &FeatureRow) -> Result<f64> {
        panic!("numeric fault in tree traversal");
    }

    fn kind(&self) -> &'static str {
        "panicking"
    }
}

/// Decoder that ignores the bytes, sleeps, and counts how often it runs
struct StubDecoder {
    output: f64,
    decodes: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl StubDecoder {
    fn new(output: f64) -> Self {
        Self {
            output,
            decodes: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }
}

impl ArtifactDecoder for StubDecoder {
    fn decode(&self, _path: &Path, _bytes: &[u8]) -> Result<DecodedModel> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(DecodedModel {
            regressor: Box::new(FixedRegressor {
                output: self.output,
                calls: self.calls.clone(),
            }),
            format: ModelFormat::Custom,
            version: Some("stub".to_string()),
        })
    }
}

struct PanicDecoder;

impl ArtifactDecoder for PanicDecoder {
    fn decode(&self, _path: &Path, _bytes: &[u8]) -> Result<DecodedModel> {
        Ok(DecodedModel {
            regressor: Box::new(PanickingRegressor),
            format: ModelFormat::Custom,
            version: None,
        })
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn test_missing_artifact_is_unavailable_every_time() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(dir.path().join("model.onnx"));

        for _ in 0..3 {
            let err = registry.get_model().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        }
        assert_eq!(registry.load_attempts(), 1);
    }

    #[test]
    fn test_missing_artifact_stays_unavailable_after_file_appears() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let registry = ModelRegistry::new(&path);

        assert!(registry.get_model().is_err());
        std::fs::write(&path, serde_json::to_vec(&linear_model_json()).unwrap()).unwrap();

        let err = registry.get_model().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert_eq!(registry.load_attempts(), 1);
    }

    #[test]
    fn test_corrupt_json_artifact() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.json", b"{\"format\": \"linear\", \"intercept\": ");
        let registry = ModelRegistry::new(path);

        let err = registry.get_model().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelCorrupt);
        assert_eq!(registry.get_model().unwrap_err(), err);
    }

    #[test]
    fn test_corrupt_onnx_artifact() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.onnx", &[0xff, 0xff, 0xff, 0xff]);
        let registry = ModelRegistry::new(path);

        assert_eq!(registry.get_model().unwrap_err().kind(), ErrorKind::ModelCorrupt);
    }

    #[test]
    fn test_onnx_artifact_loads_with_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.onnx", &scenario_onnx_model());
        let registry = ModelRegistry::new(&path);

        let handle = registry.get_model().unwrap();
        let info = handle.info();
        assert_eq!(info.format, ModelFormat::Onnx);
        assert!(info.version.is_none());
        assert_eq!(info.checksum.len(), 64);
        assert_eq!(handle.kind(), "onnx");
    }

    #[test]
    fn test_incompatible_schema_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut doc = linear_model_json();
        doc["numeric"].as_object_mut().unwrap().remove("Courier_Experience_yrs");
        let path = write_artifact(&dir, "model.json", &serde_json::to_vec(&doc).unwrap());

        let err = ModelRegistry::new(path).get_model().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelCorrupt);
        assert!(err.to_string().contains("Courier_Experience_yrs"));
    }

    #[test]
    fn test_json_artifact_loads_with_metadata() {
        let dir = TempDir::new().unwrap();
        let path = linear_artifact(&dir);
        let registry = ModelRegistry::new(&path);

        let handle = registry.get_model().unwrap();
        let info = handle.info();
        assert_eq!(info.path, path);
        assert_eq!(info.format, ModelFormat::Linear);
        assert_eq!(info.version.as_deref(), Some("test-1"));
        assert_eq!(info.checksum.len(), 64);
        assert!(info.size_bytes > 0);
        assert_eq!(handle.kind(), "linear");
    }

    #[test]
    fn test_json_detected_without_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(
            &dir,
            "model.bin",
            &serde_json::to_vec_pretty(&linear_model_json()).unwrap(),
        );
        let handle = ModelRegistry::new(path).get_model().unwrap();
        assert_eq!(handle.info().format, ModelFormat::Linear);
    }

    #[test]
    fn test_same_handle_returned() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(linear_artifact(&dir));

        let first = registry.get_model().unwrap();
        let second = registry.get_model().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.load_attempts(), 1);
    }

    #[test]
    fn test_peek_does_not_load() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(linear_artifact(&dir));

        assert!(registry.peek().is_none());
        assert_eq!(registry.load_attempts(), 0);

        registry.get_model().unwrap();
        assert!(matches!(registry.peek(), Some(Ok(_))));
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.custom", b"opaque");
        let mut decoder = StubDecoder::new(40.0);
        decoder.delay = Duration::from_millis(50);
        let decodes = decoder.decodes.clone();

        let registry = Arc::new(ModelRegistry::with_decoder(path, decoder));
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_model().unwrap()
                })
            })
            .collect();

        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.load_attempts(), 1);
        for model in &models[1..] {
            assert!(Arc::ptr_eq(&models[0], model));
        }
    }

    #[test]
    fn test_concurrent_first_access_shares_failure() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::new(dir.path().join("absent.onnx")));
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_model().unwrap_err()
                })
            })
            .collect();

        let errors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.load_attempts(), 1);
        for err in &errors {
            assert_eq!(err, &errors[0]);
            assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        }
    }
}

mod service_tests {
    use super::*;

    fn stub_service(output: f64) -> (PredictionService, Arc<AtomicUsize>, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.custom", b"opaque");
        let decoder = StubDecoder::new(output);
        let calls = decoder.calls.clone();
        let registry = Arc::new(ModelRegistry::with_decoder(path, decoder));
        (PredictionService::new(registry), calls, dir)
    }

    #[test]
    fn test_end_to_end_scenario_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::new(linear_artifact(&dir)));
        let service = PredictionService::new(registry);

        let first = service.predict(&scenario_fields()).unwrap();
        let second = service.predict(&scenario_fields()).unwrap();

        assert!(first.duration_minutes >= 0.0);
        assert_eq!(first.duration_minutes, 43.0);
        assert_eq!(first.band, Band::Average);
        assert_eq!(first, second);
    }

    #[test]
    fn test_onnx_scenario_prediction() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.onnx", &scenario_onnx_model());
        let service = PredictionService::new(Arc::new(ModelRegistry::new(path)));

        // 20 + 0 + 3 + 1 + 1 + 15 - 1.5 + 5
        let result = service.predict(&scenario_fields()).unwrap();
        assert_eq!(result.duration_minutes, 43.5);
        assert_eq!(result.band, Band::Average);
        assert_eq!(service.model_info().unwrap().format, ModelFormat::Onnx);

        let mut fields = scenario_fields();
        fields.insert("Traffic_Level".to_string(), json!("High"));
        assert_eq!(service.predict(&fields).unwrap().duration_minutes, 46.5);
    }

    #[test]
    fn test_predict_record_matches_raw_path() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::new(linear_artifact(&dir)));
        let service = PredictionService::new(registry);

        let from_raw = service.predict(&scenario_fields()).unwrap();
        let from_record = service.predict_record(&scenario_record()).unwrap();
        assert_eq!(from_raw, from_record);
    }

    #[test]
    fn test_invalid_input_never_reaches_model() {
        let (service, calls, _dir) = stub_service(20.0);

        let mut hurricane = scenario_fields();
        hurricane.insert(WEATHER.to_string(), json!("Hurricane"));
        let err = service.predict(&hurricane).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFeatureRecord);
        assert_eq!(err.field(), Some(WEATHER));

        let mut negative = scenario_fields();
        negative.insert(DISTANCE_KM.to_string(), json!(-1));
        let err = service.predict(&negative).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFeatureRecord);
        assert_eq!(err.field(), Some(DISTANCE_KM));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.registry().load_attempts(), 0);
    }

    #[test]
    fn test_validation_precedes_model_failures() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::new(dir.path().join("missing.onnx")));
        let service = PredictionService::new(registry);

        let mut raw = scenario_fields();
        raw.remove(VEHICLE_TYPE);
        assert_eq!(
            service.predict(&raw).unwrap_err().kind(),
            ErrorKind::InvalidFeatureRecord
        );

        let err = service.predict(&scenario_fields()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert!(err.kind().is_blocking());
    }

    #[test]
    fn test_predict_record_enforces_bounds() {
        let (service, calls, _dir) = stub_service(20.0);
        let mut record = scenario_record();
        record.preparation_time_min = 90;

        let err = service.predict_record(&record).unwrap_err();
        assert_eq!(err.field(), Some(PREPARATION_TIME_MIN));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_every_band_reachable() {
        for (output, band) in [
            (12.0, Band::Fast),
            (30.0, Band::Average),
            (45.0, Band::Slow),
            (75.0, Band::VerySlow),
        ] {
            let (service, calls, _dir) = stub_service(output);
            let result = service.predict(&scenario_fields()).unwrap();
            assert_eq!(result.band, band);
            assert_eq!(result.duration_minutes, output);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_negative_model_output_clamped() {
        let (service, _calls, _dir) = stub_service(-4.0);
        let result = service.predict(&scenario_fields()).unwrap();
        assert_eq!(result.duration_minutes, 0.0);
        assert_eq!(result.band, Band::Fast);
    }

    #[test]
    fn test_non_finite_model_output_fails() {
        let (service, _calls, _dir) = stub_service(f64::NAN);
        let err = service.predict(&scenario_fields()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PredictionFailed);
    }

    #[test]
    fn test_unseen_category_is_prediction_failure() {
        let dir = TempDir::new().unwrap();
        let mut doc = linear_model_json();
        doc["categorical"]["Weather"]
            .as_object_mut()
            .unwrap()
            .remove("Foggy");
        let path = write_artifact(&dir, "model.json", &serde_json::to_vec(&doc).unwrap());
        let service = PredictionService::new(Arc::new(ModelRegistry::new(path)));

        let mut raw = scenario_fields();
        raw.insert(WEATHER.to_string(), json!("Foggy"));
        let err = service.predict(&raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PredictionFailed);
        assert!(err.to_string().contains("Foggy"));
        assert!(std::error::Error::source(&err).is_some());

        // Other categories still work with the same handle
        assert!(service.predict(&scenario_fields()).is_ok());
    }

    #[test]
    fn test_model_panic_is_prediction_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(&dir, "model.custom", b"opaque");
        let registry = Arc::new(ModelRegistry::with_decoder(path, PanicDecoder));
        let service = PredictionService::new(registry);

        let err = service.predict(&scenario_fields()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PredictionFailed);
        assert!(err.to_string().contains("numeric fault"));
    }

    #[test]
    fn test_model_info() {
        let (service, _calls, _dir) = stub_service(20.0);
        let info = service.model_info().unwrap();
        assert_eq!(info.format, ModelFormat::Custom);
        assert_eq!(info.version.as_deref(), Some("stub"));
    }

    #[test]
    fn test_custom_bounds_apply() {
        let (service, _calls, _dir) = stub_service(20.0);
        let service = service.with_bounds(FeatureBounds {
            courier_experience_yrs: 0.0..=2.0,
            ..FeatureBounds::default()
        });
        let err = service.predict(&scenario_fields()).unwrap_err();
        assert_eq!(err.field(), Some(COURIER_EXPERIENCE_YRS));
        assert_eq!(service.schema().len(), SCHEMA_COLUMNS.len());
    }
}
