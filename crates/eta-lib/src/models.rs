//! Core data models for the delivery time predictor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Defines a closed set of case-sensitive literals with a stable ordinal
macro_rules! literal_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// All literals in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Exact, case-sensitive match against the literal set
            pub fn parse(value: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.as_str() == value)
            }

            /// Position in the literal set, used as the ordinal encoding
            pub fn ordinal(&self) -> usize {
                *self as usize
            }

            pub fn literals() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

literal_enum! {
    /// Weather condition at delivery time
    Weather { Clear, Rainy, Cloudy, Foggy, Windy, Snowy }
}

literal_enum! {
    /// Traffic level, ordered from lightest to heaviest
    TrafficLevel { Low, Medium, High }
}

literal_enum! {
    TimeOfDay { Morning, Afternoon, Evening, Night }
}

literal_enum! {
    VehicleType { Bike, Scooter, Car }
}

impl PartialOrd for TrafficLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrafficLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

/// Validated feature set for a single prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub distance_km: f64,
    pub weather: Weather,
    pub traffic_level: TrafficLevel,
    pub time_of_day: TimeOfDay,
    pub vehicle_type: VehicleType,
    pub preparation_time_min: u32,
    pub courier_experience_yrs: f64,
}

/// Qualitative bucket for a predicted duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    Fast,
    Average,
    Slow,
    VerySlow,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Fast, Band::Average, Band::Slow, Band::VerySlow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Fast => "Fast",
            Band::Average => "Average",
            Band::Slow => "Slow",
            Band::VerySlow => "VerySlow",
        }
    }

    /// Short message shown next to the estimate
    pub fn summary(&self) -> &'static str {
        match self {
            Band::Fast => "Your order should arrive quickly. Fast delivery expected.",
            Band::Average => "Your order is on the way. Average delivery time expected.",
            Band::Slow => "Your order might take a bit longer due to current conditions.",
            Band::VerySlow => {
                "Longer delivery time expected. Distance and traffic are likely factors."
            }
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub duration_minutes: f64,
    pub band: Band,
}

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Onnx,
    Linear,
    Forest,
    /// Produced by a caller-supplied decoder
    Custom,
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFormat::Onnx => "onnx",
            ModelFormat::Linear => "linear",
            ModelFormat::Forest => "forest",
            ModelFormat::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Metadata about the loaded model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: PathBuf,
    pub format: ModelFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checksum: String,
    pub size_bytes: usize,
    pub loaded_at: i64,
}
