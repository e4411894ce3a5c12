//! Per-sensor CSV time series.
//!
//! One `sensor_<id>.csv` per sensor with the columns
//! `step,time,temperature,x_flux,y_flux`; row `i` is the sample taken after
//! step `i + 1`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, ensure};

use crate::sim::model::SimulationResult;
use crate::sim::sensor::SensorMeasurements;

const HEADER: &str = "step,time,temperature,x_flux,y_flux";

pub fn sensor_csv_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("sensor_{id}.csv"))
}

/// Writes one CSV per sensor into `dir` (which must exist).
pub fn write_sensor_csv(dir: &Path, result: &SimulationResult) -> Result<()> {
    for record in &result.sensors {
        let path = sensor_csv_path(dir, record.id);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let m = &record.measurements;
        writeln!(writer, "{HEADER}")?;
        for (i, ((t, fx), fy)) in m
            .temperatures
            .iter()
            .zip(&m.x_fluxes)
            .zip(&m.y_fluxes)
            .enumerate()
        {
            let step = i + 1;
            writeln!(writer, "{step},{:e},{t},{fx},{fy}", result.time_at(step))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
    }
    Ok(())
}

/// Reads back the series of one sensor CSV. `init_temp` is not stored in
/// the file and is set to the first temperature (or NaN for an empty file).
pub fn read_sensor_csv(path: &Path) -> Result<SensorMeasurements> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .ok_or_else(|| anyhow!("Empty CSV file: {}", path.display()))??;
    ensure!(header.trim() == HEADER, "Unexpected CSV header: {header}");

    let mut m = SensorMeasurements {
        init_temp: f64::NAN,
        temperatures: Vec::new(),
        x_fluxes: Vec::new(),
        y_fluxes: Vec::new(),
    };
    for (n, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<f64> = line
            .split(',')
            .map(|c| c.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Invalid CSV row {}: {line}", n + 2))?;
        ensure!(cols.len() == 5, "Expected 5 columns, got {} in row {}", cols.len(), n + 2);
        m.temperatures.push(cols[2]);
        m.x_fluxes.push(cols[3]);
        m.y_fluxes.push(cols[4]);
    }
    if let Some(&t) = m.temperatures.first() {
        m.init_temp = t;
    }
    Ok(m)
}
