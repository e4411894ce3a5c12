use thiserror::Error;

/// Failures raised by the transport and measurement core.
///
/// Orchestration code wraps these in `anyhow::Error`; callers that need to
/// react to a specific condition can downcast back to `PsimError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PsimError {
    #[error("temperature {temperature} K is outside the tabulated range [{min}, {max}] K")]
    TemperatureOutOfRange { temperature: f64, min: f64, max: f64 },

    #[error("invalid sampling table: {0}")]
    InvalidTable(String),

    #[error("sensor {sensor} has no covered area")]
    ZeroArea { sensor: u32 },

    #[error("sensor {sensor} has zero heat capacity at {temperature} K")]
    ZeroHeatCapacity { sensor: u32, temperature: f64 },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("unknown material: {0}")]
    UnknownMaterial(String),

    #[error("unknown sensor: {0}")]
    UnknownSensor(u32),

    #[error("energy balance has no root in [{lower}, {upper}] K")]
    NotBracketed { lower: f64, upper: f64 },

    #[error("bisection did not converge after {iterations} iterations (window {width} K)")]
    DidNotConverge { iterations: usize, width: f64 },
}

pub type PsimResult<T> = std::result::Result<T, PsimError>;
