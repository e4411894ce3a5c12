pub mod error;
pub mod geom;
pub mod io;
pub mod sim;

// Prelude
pub use error::{PsimError, PsimResult};
pub use geom::point::Point;
pub use geom::rectangle::{Rectangle, Side};
pub use geom::vector::Vector;
pub use sim::materials::{Material, MaterialConfig, SamplingTable};
pub use sim::model::{Model, ModelConfig, SimulationResult};
pub use sim::phonon::{Phonon, Sign};
pub use sim::sensor::{EnergyBalance, Sensor, SensorMeasurements, TemperaturePolicy};
