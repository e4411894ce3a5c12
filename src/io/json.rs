use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::sim::model::{ModelConfig, SimulationResult};

/// Reads a model file.
pub fn read_model_config(path: &Path) -> Result<ModelConfig> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let config: ModelConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse model file: {}", path.display()))?;

    Ok(config)
}

pub fn write_model_config(path: &Path, config: &ModelConfig) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), config)
        .with_context(|| format!("Failed to write model file: {}", path.display()))?;
    Ok(())
}

/// Writes the full result, including the resolved configuration, as JSON.
pub fn write_results_json(path: &Path, result: &SimulationResult) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("Failed to write results: {}", path.display()))?;
    Ok(())
}

pub fn read_results_json(path: &Path) -> Result<SimulationResult> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let result = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse results: {}", path.display()))?;
    Ok(result)
}
