//! ML prediction engine

mod features;
mod inference;
mod output;
mod registry;
mod service;
mod tabular;

#[cfg(test)]
mod tests;

pub use features::{
    FeatureBounds, FeatureRow, FeatureValidator, FeatureValue, FieldKind, FieldSpec, RawFields,
    CATEGORICAL_COLUMNS, COURIER_EXPERIENCE_YRS, DISTANCE_KM, NUMERIC_COLUMNS,
    PREPARATION_TIME_MIN, SCHEMA_COLUMNS, TIME_OF_DAY, TRAFFIC_LEVEL, VEHICLE_TYPE, WEATHER,
};
pub use inference::OnnxRegressor;
pub use output::{
    classify, OutputFormatter, AVERAGE_BELOW_MINUTES, FAST_BELOW_MINUTES, SLOW_BELOW_MINUTES,
};
pub use registry::{ArtifactDecoder, DecodedModel, DefaultDecoder, ModelHandle, ModelRegistry};
pub use service::PredictionService;
pub use tabular::{ForestModel, LinearModel, Node, TabularModel, Tree};

use anyhow::Result;

/// Trait for loaded regression models
pub trait Regressor: Send + Sync {
    /// Predict a single scalar for one input row
    fn predict(&self, row: &FeatureRow) -> Result<f64>;

    /// Short name of the model family
    fn kind(&self) -> &'static str;
}
