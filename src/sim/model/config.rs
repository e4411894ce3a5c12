use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Point;
use crate::error::PsimError;
use crate::sim::engine::ExecutionMode;
use crate::sim::engine::reflection::Reflection;
use crate::sim::materials::MaterialConfig;
use crate::sim::sensor::TemperaturePolicy;

/// Sensor placement: one sensor per id, bound to a named material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub id: u32,
    pub material: String,
    pub init_temp: f64,
}

/// What a side of a cell does with phonons reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceConfig {
    Boundary {
        #[serde(default)]
        reflection: Reflection,
    },
    /// Held at `temperature`; emits and absorbs phonons.
    Emit { temperature: f64 },
    /// Open side shared with the cell at index `cell`.
    Transition { cell: usize },
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::Boundary {
            reflection: Reflection::default(),
        }
    }
}

/// Rectangular cell of the domain. `sensor` is the id of the sensor
/// measuring it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub origin: Point,
    pub length: f64,
    pub width: f64,
    pub sensor: u32,
    #[serde(default)]
    pub left: SurfaceConfig,
    #[serde(default)]
    pub right: SurfaceConfig,
    #[serde(default)]
    pub bottom: SurfaceConfig,
    #[serde(default)]
    pub top: SurfaceConfig,
}

impl CellConfig {
    pub fn surfaces(&self) -> [SurfaceConfig; 4] {
        [self.left, self.right, self.bottom, self.top]
    }
}

/// Stops the run once no sensor temperature changes by more than
/// `tolerance` between consecutive steps for `window` steps in a row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateConfig {
    pub tolerance: f64,
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    // Time
    /// Time step in seconds.
    pub time_step: f64,
    pub num_steps: usize,

    // Phonons
    /// Phonon budget: total deviational energy over the run is split into
    /// this many carriers.
    pub num_phonons: usize,
    /// Linearization temperature. If unset, the midpoint of the lowest and
    /// highest sensor or surface temperature is used.
    pub equilibrium_temperature: Option<f64>,
    /// Seed of the random streams. A random seed is drawn (and recorded in
    /// the results) if unset.
    pub seed: Option<u64>,

    // Engine
    pub temperature_policy: TemperaturePolicy,
    pub execution: ExecutionMode,
    pub steady_state: Option<SteadyStateConfig>,

    // Domain
    pub materials: Vec<MaterialConfig>,
    pub sensors: Vec<SensorConfig>,
    pub cells: Vec<CellConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self {
            time_step: 5e-12,
            num_steps: 1000,
            num_phonons: 100_000,
            equilibrium_temperature: None,
            seed: None,
            temperature_policy: TemperaturePolicy::default(),
            execution: ExecutionMode::default(),
            steady_state: None,
            materials: vec![MaterialConfig::silicon()],
            sensors: Vec::new(),
            cells: Vec::new(),
        }
    }

    /// Reads a model file (JSON).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        crate::io::read_model_config(path)
    }

    /// Checks sizes and cross references. Temperature ranges are checked
    /// when the materials are built.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.time_step > 0.0,
            "time_step must be positive, got {}",
            self.time_step
        );
        ensure!(self.num_steps > 0, "num_steps must be positive");
        ensure!(self.num_phonons > 0, "num_phonons must be positive");
        if let Some(ss) = self.steady_state {
            ensure!(
                ss.window > 0 && ss.tolerance >= 0.0,
                "steady_state needs a positive window and a non-negative tolerance"
            );
        }

        let mut names = HashSet::new();
        for m in &self.materials {
            ensure!(names.insert(m.name.as_str()), "duplicate material {}", m.name);
        }

        let mut ids = HashSet::new();
        for s in &self.sensors {
            ensure!(ids.insert(s.id), "duplicate sensor id {}", s.id);
            if !names.contains(s.material.as_str()) {
                return Err(PsimError::UnknownMaterial(s.material.clone()))
                    .with_context(|| format!("Invalid sensor {}", s.id));
            }
        }

        ensure!(!self.cells.is_empty(), "model has no cells");
        let mut covered = HashSet::new();
        for (i, c) in self.cells.iter().enumerate() {
            ensure!(
                c.length > 0.0 && c.width > 0.0,
                "cell {i} has non-positive size {} x {}",
                c.length,
                c.width
            );
            if !ids.contains(&c.sensor) {
                return Err(PsimError::UnknownSensor(c.sensor))
                    .with_context(|| format!("Invalid cell {i}"));
            }
            covered.insert(c.sensor);
            for surface in c.surfaces() {
                if let SurfaceConfig::Transition { cell } = surface {
                    ensure!(
                        cell < self.cells.len() && cell != i,
                        "cell {i} has a transition to invalid cell {cell}"
                    );
                }
            }
        }
        for s in &self.sensors {
            ensure!(covered.contains(&s.id), "sensor {} covers no cell", s.id);
        }
        Ok(())
    }

    /// Equilibrium temperature: the configured value, or the midpoint of the
    /// temperature extremes of sensors and emitting surfaces.
    pub fn resolve_equilibrium_temperature(&self) -> Option<f64> {
        if self.equilibrium_temperature.is_some() {
            return self.equilibrium_temperature;
        }
        let surfaces = self.cells.iter().flat_map(|c| c.surfaces()).filter_map(|s| match s {
            SurfaceConfig::Emit { temperature } => Some(temperature),
            _ => None,
        });
        let temps = self.sensors.iter().map(|s| s.init_temp).chain(surfaces);
        let (lo, hi) = temps.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
        (lo <= hi).then(|| 0.5 * (lo + hi))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two-cell silicon bar between a hot and a cold wall.
    pub(crate) fn bar() -> ModelConfig {
        let mut silicon = MaterialConfig::silicon();
        silicon.num_bins = 40;
        silicon.t_min = 250.0;
        silicon.t_max = 350.0;

        let side = 1e-7;
        let mut config = ModelConfig::new();
        config.materials = vec![silicon];
        config.time_step = 2e-12;
        config.num_steps = 20;
        config.num_phonons = 5000;
        config.seed = Some(7);
        config.sensors = (0..2)
            .map(|id| SensorConfig {
                id,
                material: "silicon".to_string(),
                init_temp: 300.0,
            })
            .collect();
        config.cells = vec![
            CellConfig {
                origin: Point::new(0.0, 0.0),
                length: side,
                width: side,
                sensor: 0,
                left: SurfaceConfig::Emit { temperature: 310.0 },
                right: SurfaceConfig::Transition { cell: 1 },
                bottom: SurfaceConfig::default(),
                top: SurfaceConfig::default(),
            },
            CellConfig {
                origin: Point::new(side, 0.0),
                length: side,
                width: side,
                sensor: 1,
                left: SurfaceConfig::Transition { cell: 0 },
                right: SurfaceConfig::Emit { temperature: 290.0 },
                bottom: SurfaceConfig::default(),
                top: SurfaceConfig::default(),
            },
        ];
        config
    }

    #[test]
    fn test_bar_is_valid() {
        bar().validate().unwrap();
    }

    #[test]
    fn test_equilibrium_temperature_midpoint() {
        let config = bar();
        assert_eq!(config.resolve_equilibrium_temperature(), Some(300.0));

        let mut fixed = bar();
        fixed.equilibrium_temperature = Some(295.0);
        assert_eq!(fixed.resolve_equilibrium_temperature(), Some(295.0));

        let empty = ModelConfig::new();
        assert_eq!(empty.resolve_equilibrium_temperature(), None);
    }

    #[test]
    fn test_validation_errors() {
        let mut c = bar();
        c.sensors[1].material = "germanium".to_string();
        let err = c.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<PsimError>(),
            Some(&PsimError::UnknownMaterial("germanium".to_string()))
        );

        let mut c = bar();
        c.cells[1].sensor = 9;
        let err = c.validate().unwrap_err();
        assert_eq!(err.downcast_ref::<PsimError>(), Some(&PsimError::UnknownSensor(9)));

        let mut c = bar();
        c.cells.pop();
        c.cells[0].right = SurfaceConfig::Transition { cell: 1 };
        assert!(c.validate().is_err());

        let mut c = bar();
        c.sensors.push(SensorConfig {
            id: 5,
            material: "silicon".to_string(),
            init_temp: 300.0,
        });
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("covers no cell"));

        let mut c = bar();
        c.time_step = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "num_steps": 10,
            "sensors": [{"id": 3, "material": "silicon", "init_temp": 300.0}],
            "cells": [{
                "origin": {"x": 0.0, "y": 0.0},
                "length": 1e-7,
                "width": 1e-7,
                "sensor": 3,
                "left": {"type": "Emit", "temperature": 305.0},
                "top": {"type": "Boundary", "reflection": "Diffuse"}
            }],
            "temperature_policy": {"type": "Bisection"}
        }"#;
        let c: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.num_steps, 10);
        assert_eq!(c.time_step, ModelConfig::new().time_step);
        assert_eq!(c.materials[0].name, "silicon");
        assert_eq!(c.temperature_policy, TemperaturePolicy::bisection());
        assert_eq!(c.cells[0].right, SurfaceConfig::default());
        assert_eq!(
            c.cells[0].top,
            SurfaceConfig::Boundary {
                reflection: Reflection::Diffuse
            }
        );
        c.validate().unwrap();
    }
}
