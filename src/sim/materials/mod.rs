//! Temperature-indexed phonon property tables.
//!
//! A [`Material`] holds a fixed set of phonon modes (frequency bins of each
//! polarization branch) and, for every temperature of a uniform grid, the
//! sampling tables and scalar properties derived from them. Tables are
//! built once; every query afterwards is read-only, so a material is shared
//! between sensors (and worker threads) behind an `Arc`.

pub mod dispersion;
pub mod table;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PsimError, PsimResult};

pub use dispersion::{BranchConfig, MaterialConfig, RelaxationConfig};
pub use table::{SamplingTable, TableEntry};

/// Slack allowed on the tabulated temperature range.
const RANGE_TOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    /// Longitudinal acoustic
    LA,
    /// Transverse acoustic
    TA,
}

/// A discretized phonon mode (one frequency bin of one branch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
    pub polarization: Polarization,
    /// Angular frequency in rad/s.
    pub frequency: f64,
    /// Group speed in m/s.
    pub group_speed: f64,
    /// Density of states of the bin per unit area.
    pub weight: f64,
}

/// Uniform temperature grid `t_min, t_min + t_step, ...` with `len` points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureGrid {
    pub t_min: f64,
    pub t_step: f64,
    pub len: usize,
}

impl TemperatureGrid {
    /// Grid covering `[t_min, t_max]`; the upper end is rounded up to a whole step.
    pub fn new(t_min: f64, t_max: f64, t_step: f64) -> PsimResult<Self> {
        if !(t_min > 0.0) || !(t_max >= t_min) || !(t_step > 0.0) {
            return Err(PsimError::InvalidTable(format!(
                "invalid temperature grid [{t_min}, {t_max}] step {t_step}"
            )));
        }
        let len = ((t_max - t_min) / t_step - RANGE_TOL).ceil().max(0.0) as usize + 1;
        Ok(Self { t_min, t_step, len })
    }

    pub fn t_max(&self) -> f64 {
        self.t_min + self.t_step * (self.len.saturating_sub(1)) as f64
    }

    pub fn temperature(&self, idx: usize) -> f64 {
        self.t_min + self.t_step * idx as f64
    }

    pub fn temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(|i| self.temperature(i))
    }

    fn check(&self, t: f64) -> PsimResult<()> {
        if !t.is_finite() || t < self.t_min - RANGE_TOL || t > self.t_max() + RANGE_TOL {
            return Err(PsimError::TemperatureOutOfRange {
                temperature: t,
                min: self.t_min,
                max: self.t_max(),
            });
        }
        Ok(())
    }

    /// Index of the grid point nearest to `t`.
    fn nearest(&self, t: f64) -> PsimResult<usize> {
        self.check(t)?;
        let pos = ((t - self.t_min) / self.t_step).round();
        Ok((pos.max(0.0) as usize).min(self.len - 1))
    }

    /// Lower bracketing index and interpolation weight of `t`.
    fn bracket(&self, t: f64) -> PsimResult<(usize, f64)> {
        self.check(t)?;
        if self.len == 1 {
            return Ok((0, 0.0));
        }
        let pos = ((t - self.t_min) / self.t_step).clamp(0.0, (self.len - 1) as f64);
        let lo = (pos.floor() as usize).min(self.len - 2);
        Ok((lo, pos - lo as f64))
    }
}

/// All tables and scalars of a material at one grid temperature.
#[derive(Debug, Clone)]
pub struct TableSet {
    /// Mode distribution of deviational energy (weights ~ mode heat capacity).
    pub base: Arc<SamplingTable>,
    /// Post-scattering mode distribution (weights ~ heat capacity / tau).
    pub scatter: Arc<SamplingTable>,
    /// Mode distribution of phonons leaving an emitting surface.
    pub emit: Arc<SamplingTable>,
    /// Heat capacity per unit area.
    pub heat_capacity: f64,
    /// Energy flux emitted per unit surface length.
    pub emit_energy: f64,
    /// Equilibrium energy per unit area.
    pub theoretical_energy: f64,
    /// Relaxation time of every mode, in seconds.
    pub relaxation_times: Arc<[f64]>,
}

/// Read-only property source keyed by temperature.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    modes: Vec<Mode>,
    grid: TemperatureGrid,
    tables: Vec<TableSet>,
}

impl Material {
    /// Builds a material from pre-computed tables, one [`TableSet`] per grid point.
    pub fn from_tables(
        name: &str,
        modes: Vec<Mode>,
        grid: TemperatureGrid,
        tables: Vec<TableSet>,
    ) -> PsimResult<Self> {
        if grid.len == 0 || !(grid.t_step > 0.0) || !(grid.t_min > 0.0) {
            return Err(PsimError::InvalidTable(format!(
                "material {name}: empty or degenerate temperature grid {grid:?}"
            )));
        }
        if tables.len() != grid.len {
            return Err(PsimError::InvalidTable(format!(
                "material {name}: {} table sets for {} grid temperatures",
                tables.len(),
                grid.len
            )));
        }
        let n = modes.len();
        for (i, set) in tables.iter().enumerate() {
            let sizes = [
                set.base.len(),
                set.scatter.len(),
                set.emit.len(),
                set.relaxation_times.len(),
            ];
            if sizes.iter().any(|&s| s != n) {
                return Err(PsimError::InvalidTable(format!(
                    "material {name}: table set {i} has sizes {sizes:?}, expected {n} modes"
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            modes,
            grid,
            tables,
        })
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn mode(&self, idx: usize) -> Option<&Mode> {
        self.modes.get(idx)
    }

    pub fn grid(&self) -> &TemperatureGrid {
        &self.grid
    }

    /// Tabulated temperature range `(min, max)`.
    pub fn range(&self) -> (f64, f64) {
        (self.grid.t_min, self.grid.t_max())
    }

    fn interpolate(&self, t: f64, f: impl Fn(&TableSet) -> f64) -> PsimResult<f64> {
        let (lo, w) = self.grid.bracket(t)?;
        let a = f(&self.tables[lo]);
        if w == 0.0 {
            return Ok(a);
        }
        let b = f(&self.tables[lo + 1]);
        Ok(a + (b - a) * w)
    }

    /// Free-flight mode table at `t` and the heat capacity at `t`.
    pub fn base_table(&self, t: f64) -> PsimResult<(Arc<SamplingTable>, f64)> {
        let idx = self.grid.nearest(t)?;
        let heat_capacity = self.interpolate(t, |s| s.heat_capacity)?;
        Ok((Arc::clone(&self.tables[idx].base), heat_capacity))
    }

    pub fn scatter_table(&self, t: f64) -> PsimResult<Arc<SamplingTable>> {
        let idx = self.grid.nearest(t)?;
        Ok(Arc::clone(&self.tables[idx].scatter))
    }

    /// Emission table at `t` and the energy flux per unit length emitted at `t`.
    pub fn emit_data(&self, t: f64) -> PsimResult<(Arc<SamplingTable>, f64)> {
        let idx = self.grid.nearest(t)?;
        let energy = self.interpolate(t, |s| s.emit_energy)?;
        Ok((Arc::clone(&self.tables[idx].emit), energy))
    }

    /// Equilibrium energy per unit area at `t`, linear between grid points.
    pub fn theoretical_energy(&self, t: f64) -> PsimResult<f64> {
        self.interpolate(t, |s| s.theoretical_energy)
    }

    pub fn heat_capacity(&self, t: f64) -> PsimResult<f64> {
        self.interpolate(t, |s| s.heat_capacity)
    }

    pub fn relaxation_times(&self, t: f64) -> PsimResult<Arc<[f64]>> {
        let idx = self.grid.nearest(t)?;
        Ok(Arc::clone(&self.tables[idx].relaxation_times))
    }
}
