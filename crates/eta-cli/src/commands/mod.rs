//! CLI subcommand implementations

pub mod model;
pub mod predict;
pub mod status;
