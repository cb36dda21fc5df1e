//! Feature validation for ML inference
//!
//! Coerces the raw field mapping supplied by a form into a typed
//! [`FeatureRecord`] and lays it out as the single-row record the model
//! was trained on.

use crate::error::PredictionError;
use crate::models::{FeatureRecord, TimeOfDay, TrafficLevel, VehicleType, Weather};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use tracing::debug;

/// Raw field values keyed by schema column name
pub type RawFields = HashMap<String, Value>;

pub const DISTANCE_KM: &str = "Distance_km";
pub const WEATHER: &str = "Weather";
pub const TRAFFIC_LEVEL: &str = "Traffic_Level";
pub const TIME_OF_DAY: &str = "Time_of_Day";
pub const VEHICLE_TYPE: &str = "Vehicle_Type";
pub const PREPARATION_TIME_MIN: &str = "Preparation_Time_min";
pub const COURIER_EXPERIENCE_YRS: &str = "Courier_Experience_yrs";

/// Column order of the trained schema
pub const SCHEMA_COLUMNS: [&str; 7] = [
    DISTANCE_KM,
    WEATHER,
    TRAFFIC_LEVEL,
    TIME_OF_DAY,
    VEHICLE_TYPE,
    PREPARATION_TIME_MIN,
    COURIER_EXPERIENCE_YRS,
];

/// Numeric columns of the schema
pub const NUMERIC_COLUMNS: [&str; 3] = [DISTANCE_KM, PREPARATION_TIME_MIN, COURIER_EXPERIENCE_YRS];

/// Categorical columns of the schema
pub const CATEGORICAL_COLUMNS: [&str; 4] = [WEATHER, TRAFFIC_LEVEL, TIME_OF_DAY, VEHICLE_TYPE];

/// Accepted input domain for the numeric fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBounds {
    pub distance_km: RangeInclusive<f64>,
    pub preparation_time_min: RangeInclusive<u32>,
    pub courier_experience_yrs: RangeInclusive<f64>,
}

impl Default for FeatureBounds {
    fn default() -> Self {
        Self {
            distance_km: 0.5..=25.0,
            preparation_time_min: 1..=40,
            courier_experience_yrs: 0.0..=15.0,
        }
    }
}

/// A single cell of the model input row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    /// Category literal and its ordinal in the literal set
    Category(&'static str, usize),
}

impl FeatureValue {
    /// Numeric encoding: the number itself, or the category ordinal
    pub fn encoded(&self) -> f64 {
        match self {
            FeatureValue::Number(v) => *v,
            FeatureValue::Category(_, ordinal) => *ordinal as f64,
        }
    }
}

/// Single-row structured record with the trained column names
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    cells: [(&'static str, FeatureValue); 7],
}

impl FeatureRow {
    pub fn from_record(record: &FeatureRecord) -> Self {
        let category = FeatureValue::Category;
        Self {
            cells: [
                (DISTANCE_KM, FeatureValue::Number(record.distance_km)),
                (WEATHER, category(record.weather.as_str(), record.weather.ordinal())),
                (
                    TRAFFIC_LEVEL,
                    category(record.traffic_level.as_str(), record.traffic_level.ordinal()),
                ),
                (
                    TIME_OF_DAY,
                    category(record.time_of_day.as_str(), record.time_of_day.ordinal()),
                ),
                (
                    VEHICLE_TYPE,
                    category(record.vehicle_type.as_str(), record.vehicle_type.ordinal()),
                ),
                (
                    PREPARATION_TIME_MIN,
                    FeatureValue::Number(record.preparation_time_min as f64),
                ),
                (
                    COURIER_EXPERIENCE_YRS,
                    FeatureValue::Number(record.courier_experience_yrs),
                ),
            ],
        }
    }

    pub fn get(&self, column: &str) -> Option<FeatureValue> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FeatureValue)> + '_ {
        self.cells.iter().copied()
    }

    /// Row encoded as f32 in schema column order
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.cells.iter().map(|(_, v)| v.encoded() as f32).collect()
    }
}

/// Kind and accepted domain of a field, for form rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Real { min: f64, max: f64 },
    Integer { min: u32, max: u32 },
    Category { options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Validates raw field mappings against the fixed schema
#[derive(Debug, Clone, Default)]
pub struct FeatureValidator {
    bounds: FeatureBounds,
}

impl FeatureValidator {
    pub fn new(bounds: FeatureBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &FeatureBounds {
        &self.bounds
    }

    /// Coerce every field, failing on the first offending one in schema order
    pub fn validate(&self, raw: &RawFields) -> Result<FeatureRecord, PredictionError> {
        for key in raw.keys() {
            if !SCHEMA_COLUMNS.contains(&key.as_str()) {
                debug!(field = %key, "Ignoring field outside the feature schema");
            }
        }

        Ok(FeatureRecord {
            distance_km: real_field(raw, DISTANCE_KM, &self.bounds.distance_km)?,
            weather: category_field(raw, WEATHER, Weather::parse, &Weather::literals())?,
            traffic_level: category_field(
                raw,
                TRAFFIC_LEVEL,
                TrafficLevel::parse,
                &TrafficLevel::literals(),
            )?,
            time_of_day: category_field(
                raw,
                TIME_OF_DAY,
                TimeOfDay::parse,
                &TimeOfDay::literals(),
            )?,
            vehicle_type: category_field(
                raw,
                VEHICLE_TYPE,
                VehicleType::parse,
                &VehicleType::literals(),
            )?,
            preparation_time_min: integer_field(
                raw,
                PREPARATION_TIME_MIN,
                &self.bounds.preparation_time_min,
            )?,
            courier_experience_yrs: real_field(
                raw,
                COURIER_EXPERIENCE_YRS,
                &self.bounds.courier_experience_yrs,
            )?,
        })
    }

    /// Re-check an already typed record against the numeric bounds
    pub fn check_record(&self, record: &FeatureRecord) -> Result<(), PredictionError> {
        check_range(DISTANCE_KM, record.distance_km, &self.bounds.distance_km)?;
        if !self.bounds.preparation_time_min.contains(&record.preparation_time_min) {
            return Err(out_of_range(
                PREPARATION_TIME_MIN,
                record.preparation_time_min,
                self.bounds.preparation_time_min.start(),
                self.bounds.preparation_time_min.end(),
            ));
        }
        check_range(
            COURIER_EXPERIENCE_YRS,
            record.courier_experience_yrs,
            &self.bounds.courier_experience_yrs,
        )
    }

    /// Field specifications in schema order
    pub fn schema(&self) -> Vec<FieldSpec> {
        let real = |range: &RangeInclusive<f64>| FieldKind::Real {
            min: *range.start(),
            max: *range.end(),
        };
        let options = |literals: Vec<&'static str>| FieldKind::Category {
            options: literals.into_iter().map(str::to_string).collect(),
        };

        SCHEMA_COLUMNS
            .iter()
            .map(|name| {
                let kind = match *name {
                    DISTANCE_KM => real(&self.bounds.distance_km),
                    WEATHER => options(Weather::literals()),
                    TRAFFIC_LEVEL => options(TrafficLevel::literals()),
                    TIME_OF_DAY => options(TimeOfDay::literals()),
                    VEHICLE_TYPE => options(VehicleType::literals()),
                    PREPARATION_TIME_MIN => FieldKind::Integer {
                        min: *self.bounds.preparation_time_min.start(),
                        max: *self.bounds.preparation_time_min.end(),
                    },
                    _ => real(&self.bounds.courier_experience_yrs),
                };
                FieldSpec {
                    name: name.to_string(),
                    kind,
                }
            })
            .collect()
    }
}

fn required<'a>(raw: &'a RawFields, field: &str) -> Result<&'a Value, PredictionError> {
    match raw.get(field) {
        None | Some(Value::Null) => Err(PredictionError::invalid(field, "missing")),
        Some(value) => Ok(value),
    }
}

fn number(field: &str, value: &Value) -> Result<f64, PredictionError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(PredictionError::invalid(field, "must be a finite number")),
        None => Err(PredictionError::invalid(
            field,
            format!("expected a number, got {}", value),
        )),
    }
}

fn out_of_range(
    field: &str,
    value: impl Display,
    min: impl Display,
    max: impl Display,
) -> PredictionError {
    PredictionError::invalid(
        field,
        format!("{} is outside the range {}..={}", value, min, max),
    )
}

fn check_range(
    field: &str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), PredictionError> {
    if !value.is_finite() {
        return Err(PredictionError::invalid(field, "must be a finite number"));
    }
    if !range.contains(&value) {
        return Err(out_of_range(field, value, range.start(), range.end()));
    }
    Ok(())
}

fn real_field(
    raw: &RawFields,
    field: &str,
    range: &RangeInclusive<f64>,
) -> Result<f64, PredictionError> {
    let value = number(field, required(raw, field)?)?;
    check_range(field, value, range)?;
    Ok(value)
}

fn integer_field(
    raw: &RawFields,
    field: &str,
    range: &RangeInclusive<u32>,
) -> Result<u32, PredictionError> {
    let value = number(field, required(raw, field)?)?;
    if value.fract() != 0.0 {
        return Err(PredictionError::invalid(
            field,
            format!("expected a whole number of minutes, got {}", value),
        ));
    }
    if value < *range.start() as f64 || value > *range.end() as f64 {
        return Err(out_of_range(field, value, range.start(), range.end()));
    }
    Ok(value as u32)
}

fn category_field<T>(
    raw: &RawFields,
    field: &str,
    parse: fn(&str) -> Option<T>,
    literals: &[&str],
) -> Result<T, PredictionError> {
    let value = required(raw, field)?;
    let text = value.as_str().ok_or_else(|| {
        PredictionError::invalid(field, format!("expected a string, got {}", value))
    })?;
    parse(text).ok_or_else(|| {
        PredictionError::invalid(
            field,
            format!("unknown value `{}`, expected one of {}", text, literals.join(", ")),
        )
    })
}
