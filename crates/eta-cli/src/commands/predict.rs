//! Delivery time prediction command

use anyhow::Result;
use clap::{builder::PossibleValuesParser, Args};
use colored::Colorize;
use eta_lib::{
    predictor::{
        RawFields, COURIER_EXPERIENCE_YRS, DISTANCE_KM, PREPARATION_TIME_MIN, TIME_OF_DAY,
        TRAFFIC_LEVEL, VEHICLE_TYPE, WEATHER,
    },
    ErrorDescriptor, ModelRegistry, PredictionService, TimeOfDay, TrafficLevel, VehicleType,
    Weather,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{ApiClient, ApiFailure, ModelSummary, PredictResponse};
use crate::output::{
    color_band, format_minutes, print_json, print_rows, print_warning, short_checksum, DetailRow,
    OutputFormat,
};

/// Order and courier conditions
#[derive(Debug, Clone, Args)]
pub struct PredictArgs {
    /// Delivery distance in kilometres
    #[arg(long)]
    pub distance: f64,

    #[arg(long, value_parser = PossibleValuesParser::new(Weather::literals()))]
    pub weather: String,

    #[arg(long, value_parser = PossibleValuesParser::new(TrafficLevel::literals()))]
    pub traffic: String,

    #[arg(long, value_parser = PossibleValuesParser::new(TimeOfDay::literals()))]
    pub time_of_day: String,

    #[arg(long, value_parser = PossibleValuesParser::new(VehicleType::literals()))]
    pub vehicle: String,

    /// Order preparation time in minutes
    #[arg(long)]
    pub prep_time: u32,

    /// Courier experience in years
    #[arg(long)]
    pub experience: f64,

    /// Predict locally from this model artifact instead of calling the server
    #[arg(long)]
    pub model: Option<PathBuf>,
}

impl PredictArgs {
    /// Raw field mapping, keyed by schema column
    pub fn to_fields(&self) -> RawFields {
        RawFields::from([
            (DISTANCE_KM.to_string(), json!(self.distance)),
            (WEATHER.to_string(), json!(self.weather)),
            (TRAFFIC_LEVEL.to_string(), json!(self.traffic)),
            (TIME_OF_DAY.to_string(), json!(self.time_of_day)),
            (VEHICLE_TYPE.to_string(), json!(self.vehicle)),
            (PREPARATION_TIME_MIN.to_string(), json!(self.prep_time)),
            (COURIER_EXPERIENCE_YRS.to_string(), json!(self.experience)),
        ])
    }
}

/// Ask the server for a prediction
pub async fn predict_remote(
    client: &ApiClient,
    args: &PredictArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match client
        .post::<PredictResponse, _>("api/v1/predict", &args.to_fields())
        .await
    {
        Ok(response) => render(&response, format, verbose),
        Err(err) => {
            let descriptor = err
                .downcast_ref::<ApiFailure>()
                .and_then(|failure| failure.descriptor.as_ref());
            if let Some(descriptor) = descriptor {
                report_failure(descriptor, format)?;
            }
            Err(err)
        }
    }
}

/// Load the artifact in-process and predict
pub fn predict_local(
    model_path: &Path,
    args: &PredictArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let service = PredictionService::new(Arc::new(ModelRegistry::new(model_path)));

    let outcome = service
        .predict(&args.to_fields())
        .and_then(|result| Ok((result, service.model_info()?)));

    match outcome {
        Ok((result, info)) => {
            let response = PredictResponse {
                duration_minutes: result.duration_minutes,
                band: result.band,
                summary: result.band.summary().to_string(),
                model: ModelSummary {
                    format: info.format.to_string(),
                    version: info.version,
                    checksum: info.checksum,
                },
            };
            render(&response, format, verbose)
        }
        Err(err) => {
            report_failure(&err.descriptor(), format)?;
            Err(err.into())
        }
    }
}

fn report_failure(descriptor: &ErrorDescriptor, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(descriptor)?,
        OutputFormat::Table => {
            if descriptor.stage.is_blocking() {
                print_warning("Predictions are disabled until the model artifact is fixed");
            }
        }
    }
    Ok(())
}

fn render(response: &PredictResponse, format: OutputFormat, verbose: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(response)?,
        OutputFormat::Table => {
            println!("{}", "Delivery Estimate".bold());
            let mut rows = vec![
                DetailRow::new("Estimated time", format_minutes(response.duration_minutes)),
                DetailRow::new("Band", color_band(response.band)),
                DetailRow::new("Summary", response.summary.clone()),
            ];
            if verbose {
                let model = &response.model;
                rows.push(DetailRow::new("Model format", model.format.clone()));
                rows.push(DetailRow::new(
                    "Model version",
                    model.version.clone().unwrap_or_else(|| "-".to_string()),
                ));
                rows.push(DetailRow::new("Checksum", short_checksum(&model.checksum)));
            }
            print_rows(rows);
        }
    }
    Ok(())
}
