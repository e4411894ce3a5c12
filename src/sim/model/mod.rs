mod config;
mod result;
mod simulation;

pub use config::{CellConfig, ModelConfig, SensorConfig, SteadyStateConfig, SurfaceConfig};
pub use result::{SensorRecord, SimulationResult};
pub use simulation::{Model, SimulationProgress};
