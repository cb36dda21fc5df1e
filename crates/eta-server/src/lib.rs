//! Delivery ETA prediction server
//!
//! Hosts the prediction service over HTTP next to health and metrics
//! endpoints.

pub mod api;
pub mod config;
