use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sim::sensor::SensorMeasurements;

use super::config::ModelConfig;

/// Time series of one sensor together with the area it covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: u32,
    pub area: f64,
    pub measurements: SensorMeasurements,
}

/// Everything needed to report and reproduce a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Random identifier of this run.
    pub run_id: String,
    /// Configuration with the seed and equilibrium temperature resolved.
    pub config: ModelConfig,
    /// Steps actually run (less than `config.num_steps` on early stop).
    pub steps: usize,
    pub stopped_early: bool,
    pub effective_energy: f64,
    pub equilibrium_temperature: f64,
    pub sensors: Vec<SensorRecord>,
}

impl SimulationResult {
    pub(crate) fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn sensor(&self, id: u32) -> Option<&SensorRecord> {
        self.sensors.iter().find(|s| s.id == id)
    }

    /// Last recorded temperature of every sensor, in sensor order.
    pub fn final_temperatures(&self) -> Vec<(u32, f64)> {
        self.sensors
            .iter()
            .map(|s| {
                let t = s
                    .measurements
                    .temperatures
                    .last()
                    .copied()
                    .unwrap_or(s.measurements.init_temp);
                (s.id, t)
            })
            .collect()
    }

    /// Simulated time of step `step` (1-based: the first sample is taken
    /// after one time step).
    pub fn time_at(&self, step: usize) -> f64 {
        step as f64 * self.config.time_step
    }
}
