//! Stationary measurement points.
//!
//! A [`Sensor`] is bound to a region of the domain (the cells that register
//! their area with it) and converts the phonons found in that region at the
//! end of a step into temperature and heat flux samples:
//!
//! ```text
//! energy_units = sum(sign)
//! flux_x       = sum(sign * speed * dx) * eff_energy / area
//! flux_y       = sum(sign * speed * dy) * eff_energy / area
//! T            = t_eq + energy_units * eff_energy / (area * C(T_prev))   (linearized)
//! ```
//!
//! After each measurement the sensor re-queries its material at the new
//! temperature, so transport in the next step sees updated tables.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PsimError, PsimResult};
use crate::sim::materials::{Material, SamplingTable};
use crate::sim::phonon::Phonon;

/// Energy that `E(T) * area` is balanced against in [`TemperaturePolicy::Bisection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EnergyBalance {
    /// `E(T) * A = eff_energy * energy_units`: the phonons carry the whole
    /// energy of the region.
    #[default]
    Absolute,
    /// `E(T) * A = E(t_eq) * A + eff_energy * energy_units`: the phonons carry
    /// the deviation from equilibrium. Its first-order expansion around
    /// `t_eq` is [`TemperaturePolicy::Linearized`].
    Deviational,
}

/// How a sensor turns a net energy count into a temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum TemperaturePolicy {
    /// First-order expansion of the energy balance around `t_eq`, using the
    /// heat capacity at the previous temperature.
    #[default]
    Linearized,
    /// Solves the [`EnergyBalance`] for `T` by bisection on
    /// `[init_temp - bound, init_temp + bound]`.
    Bisection {
        #[serde(default)]
        balance: EnergyBalance,
        #[serde(default = "default_bound")]
        bound: f64,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
}

fn default_bound() -> f64 {
    200.0
}

fn default_max_iterations() -> usize {
    30
}

fn default_tolerance() -> f64 {
    1e-4
}

impl TemperaturePolicy {
    /// Bisection on the absolute energy balance with a 200 K window,
    /// 30 iterations and 1e-4 K tolerance.
    pub fn bisection() -> Self {
        Self::bisection_with(EnergyBalance::Absolute)
    }

    /// Bisection with default window and tolerance on the given balance.
    pub fn bisection_with(balance: EnergyBalance) -> Self {
        Self::Bisection {
            balance,
            bound: default_bound(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Material tables cached by a sensor for its current temperature.
#[derive(Debug, Clone)]
pub struct SensorTables {
    pub temperature: f64,
    pub base_table: Arc<SamplingTable>,
    pub scatter_table: Arc<SamplingTable>,
    pub heat_capacity: f64,
    pub relaxation_times: Arc<[f64]>,
}

impl SensorTables {
    fn at(material: &Material, temperature: f64) -> PsimResult<Self> {
        let (base_table, heat_capacity) = material.base_table(temperature)?;
        Ok(Self {
            temperature,
            base_table,
            scatter_table: material.scatter_table(temperature)?,
            heat_capacity,
            relaxation_times: material.relaxation_times(temperature)?,
        })
    }
}

/// Time series recorded by a sensor. Index `i` of each series is step `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMeasurements {
    pub init_temp: f64,
    pub temperatures: Vec<f64>,
    pub x_fluxes: Vec<f64>,
    pub y_fluxes: Vec<f64>,
}

impl SensorMeasurements {
    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }

    /// Splits into `(temperatures, x_fluxes, y_fluxes)`.
    pub fn into_series(self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (self.temperatures, self.x_fluxes, self.y_fluxes)
    }
}

/// Sums accumulated over the phonons of one measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhononTally {
    pub energy_units: i64,
    pub x_flux: f64,
    pub y_flux: f64,
}

impl PhononTally {
    pub fn from_phonons<'a, I>(phonons: I) -> Self
    where
        I: IntoIterator<Item = &'a Phonon>,
    {
        let mut tally = Self::default();
        for p in phonons {
            let sign = p.sign();
            let (dx, dy) = p.direction();
            tally.energy_units += sign as i64;
            tally.x_flux += dx * p.speed() * sign as f64;
            tally.y_flux += dy * p.speed() * sign as f64;
        }
        tally
    }
}

pub struct Sensor {
    id: u32,
    init_temp: f64,
    material: Arc<Material>,
    policy: TemperaturePolicy,
    area_covered: f64,
    tables: SensorTables,
    temperatures: Vec<f64>,
    x_fluxes: Vec<f64>,
    y_fluxes: Vec<f64>,
}

impl Sensor {
    /// Creates a sensor at `init_temp`. Fails if the material does not
    /// cover `init_temp`.
    pub fn new(
        id: u32,
        material: Arc<Material>,
        init_temp: f64,
        policy: TemperaturePolicy,
    ) -> PsimResult<Self> {
        let tables = SensorTables::at(&material, init_temp)?;
        Ok(Self {
            id,
            init_temp,
            material,
            policy,
            area_covered: 0.0,
            tables,
            temperatures: Vec::new(),
            x_fluxes: Vec::new(),
            y_fluxes: Vec::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn init_temp(&self) -> f64 {
        self.init_temp
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn policy(&self) -> TemperaturePolicy {
        self.policy
    }

    pub fn area_covered(&self) -> f64 {
        self.area_covered
    }

    /// Current temperature: the last recorded sample, or `init_temp`.
    pub fn temperature(&self) -> f64 {
        self.tables.temperature
    }

    pub fn heat_capacity(&self) -> f64 {
        self.tables.heat_capacity
    }

    pub fn base_table(&self) -> &Arc<SamplingTable> {
        &self.tables.base_table
    }

    pub fn scatter_table(&self) -> &Arc<SamplingTable> {
        &self.tables.scatter_table
    }

    pub fn tables(&self) -> &SensorTables {
        &self.tables
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn x_fluxes(&self) -> &[f64] {
        &self.x_fluxes
    }

    pub fn y_fluxes(&self) -> &[f64] {
        &self.y_fluxes
    }

    pub fn add_to_area(&mut self, area: f64) {
        self.area_covered += area;
    }

    /// Emission table and emitted energy flux of the sensor's material at `t`.
    pub fn get_emit_data(&self, t: f64) -> PsimResult<(Arc<SamplingTable>, f64)> {
        self.material.emit_data(t)
    }

    /// Records one temperature and flux sample from the phonons in the
    /// sensor's region, then refreshes the cached tables.
    ///
    /// On error nothing is recorded and the cached tables are unchanged.
    pub fn take_measurements<'a, I>(
        &mut self,
        phonons: I,
        eff_energy: f64,
        t_eq: f64,
    ) -> PsimResult<()>
    where
        I: IntoIterator<Item = &'a Phonon>,
    {
        if !(self.area_covered > 0.0) {
            return Err(PsimError::ZeroArea { sensor: self.id });
        }

        let tally = PhononTally::from_phonons(phonons);
        let flux_factor = eff_energy / self.area_covered;
        let temperature = self.solve_temperature(&tally, eff_energy, t_eq)?;
        self.refresh(temperature)?;

        self.temperatures.push(temperature);
        self.x_fluxes.push(tally.x_flux * flux_factor);
        self.y_fluxes.push(tally.y_flux * flux_factor);
        Ok(())
    }

    /// Re-queries the material at `temperature` and replaces the cached
    /// tables. On error the previous tables are kept.
    pub fn refresh(&mut self, temperature: f64) -> PsimResult<()> {
        self.tables = SensorTables::at(&self.material, temperature)?;
        Ok(())
    }

    fn solve_temperature(
        &self,
        tally: &PhononTally,
        eff_energy: f64,
        t_eq: f64,
    ) -> PsimResult<f64> {
        let energy = tally.energy_units as f64 * eff_energy;
        match self.policy {
            TemperaturePolicy::Linearized => {
                let c = self.tables.heat_capacity;
                if !(c.abs() > 0.0) {
                    return Err(PsimError::ZeroHeatCapacity {
                        sensor: self.id,
                        temperature: self.tables.temperature,
                    });
                }
                Ok(t_eq + energy / (self.area_covered * c))
            }
            TemperaturePolicy::Bisection {
                balance,
                bound,
                max_iterations,
                tolerance,
            } => {
                let target = match balance {
                    EnergyBalance::Absolute => energy,
                    EnergyBalance::Deviational => {
                        self.material.theoretical_energy(t_eq)? * self.area_covered + energy
                    }
                };
                solve_energy_balance(
                    &self.material,
                    self.area_covered,
                    target,
                    (self.init_temp - bound, self.init_temp + bound),
                    max_iterations,
                    tolerance,
                )
            }
        }
    }

    /// Read-only copy of the recorded time series.
    pub fn get_measurements(&self) -> SensorMeasurements {
        SensorMeasurements {
            init_temp: self.init_temp,
            temperatures: self.temperatures.clone(),
            x_fluxes: self.x_fluxes.clone(),
            y_fluxes: self.y_fluxes.clone(),
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensor {}: {:.2}", self.id, self.temperature())
    }
}

/// Finds `T` with `E(T) * area = target` by bisection.
///
/// The window is clipped to the material's tabulated range. Fails with
/// [`PsimError::NotBracketed`] if the root is outside the window and with
/// [`PsimError::DidNotConverge`] if the window is still wider than
/// `tolerance` after `max_iterations` halvings.
pub fn solve_energy_balance(
    material: &Material,
    area: f64,
    target: f64,
    window: (f64, f64),
    max_iterations: usize,
    tolerance: f64,
) -> PsimResult<f64> {
    let (t_min, t_max) = material.range();
    let mut lb = window.0.max(t_min);
    let mut ub = window.1.min(t_max);
    let residual =
        |t: f64| -> PsimResult<f64> { Ok(material.theoretical_energy(t)? * area - target) };

    if lb > ub || residual(lb)? > 0.0 || residual(ub)? < 0.0 {
        return Err(PsimError::NotBracketed {
            lower: lb,
            upper: ub,
        });
    }

    let mut iterations = 0;
    while ub - lb >= tolerance {
        if iterations == max_iterations {
            return Err(PsimError::DidNotConverge {
                iterations,
                width: ub - lb,
            });
        }
        let mid = 0.5 * (lb + ub);
        if residual(mid)? < 0.0 {
            lb = mid;
        } else {
            ub = mid;
        }
        iterations += 1;
    }
    Ok(0.5 * (lb + ub))
}
