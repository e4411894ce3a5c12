//! File I/O for models and simulation results.
//!
//! Model files and full results are JSON; per-sensor time series are also
//! written as CSV for plotting.

pub mod csv;
pub mod json;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::model::SimulationResult;

pub use csv::{read_sensor_csv, write_sensor_csv};
pub use json::{read_model_config, read_results_json, write_model_config, write_results_json};

/// File name of the JSON results inside an output directory.
pub const RESULTS_FILE: &str = "results.json";

/// Creates `dir` if needed and writes `results.json` and one
/// `sensor_<id>.csv` per sensor into it.
pub fn write_results(dir: &Path, result: &SimulationResult) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    write_results_json(&dir.join(RESULTS_FILE), result)?;
    write_sensor_csv(dir, result)?;
    log::info!("Results written to {}", dir.display());
    Ok(())
}
