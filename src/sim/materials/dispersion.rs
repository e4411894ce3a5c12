use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Material, Mode, Polarization, SamplingTable, TableSet, TemperatureGrid};
use crate::error::{PsimError, PsimResult};

/// Reduced Planck constant in J*s.
pub const HBAR: f64 = 1.054_571_817e-34;
/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Quadratic dispersion branch `w(k) = c1*k + c2*k^2` for `k` in `(0, k_max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub polarization: Polarization,
    /// Linear coefficient (sound speed) in m/s.
    pub c1: f64,
    /// Quadratic coefficient in m^2/s.
    pub c2: f64,
    /// Brillouin zone edge in 1/m.
    pub k_max: f64,
    /// Number of degenerate branches represented.
    #[serde(default = "default_degeneracy")]
    pub degeneracy: f64,
}

fn default_degeneracy() -> f64 {
    1.0
}

/// Relaxation rate `1/tau = b_i*w^4 + b_u*w^2*T*exp(-c_u/T)`.
///
/// The first term is impurity scattering, the second umklapp scattering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxationConfig {
    pub b_i: f64,
    pub b_u: f64,
    pub c_u: f64,
}

impl RelaxationConfig {
    pub fn rate(&self, frequency: f64, temperature: f64) -> f64 {
        let w2 = frequency * frequency;
        self.b_i * w2 * w2 + self.b_u * w2 * temperature * (-self.c_u / temperature).exp()
    }
}

/// Description of a material from which all temperature tables are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    pub branches: Vec<BranchConfig>,
    pub relaxation: RelaxationConfig,
    /// Frequency bins per branch.
    #[serde(default = "default_num_bins")]
    pub num_bins: usize,
    pub t_min: f64,
    pub t_max: f64,
    #[serde(default = "default_t_step")]
    pub t_step: f64,
}

fn default_num_bins() -> usize {
    1000
}

fn default_t_step() -> f64 {
    1.0
}

impl MaterialConfig {
    /// Silicon with the quadratic LA/TA fits of Pop et al. (2004).
    pub fn silicon() -> Self {
        let k_max = 1.157e10;
        Self {
            name: "silicon".to_string(),
            branches: vec![
                BranchConfig {
                    polarization: Polarization::LA,
                    c1: 9.01e3,
                    c2: -2.0e-7,
                    k_max,
                    degeneracy: 1.0,
                },
                BranchConfig {
                    polarization: Polarization::TA,
                    c1: 5.23e3,
                    c2: -2.26e-7,
                    k_max,
                    degeneracy: 1.0,
                },
            ],
            relaxation: RelaxationConfig {
                b_i: 1.2e-45,
                b_u: 2.8e-19,
                c_u: 140.0,
            },
            num_bins: default_num_bins(),
            t_min: 1.0,
            t_max: 600.0,
            t_step: default_t_step(),
        }
    }
}

/// Mean Bose-Einstein occupation of a mode with `x = hbar*w / (kB*T)`.
fn occupation(x: f64) -> f64 {
    1.0 / x.exp_m1()
}

/// `x^2 e^x / (e^x - 1)^2`, written to stay finite for large `x`.
fn occupation_derivative(x: f64) -> f64 {
    let h = 0.5 * x;
    let r = h / h.sinh();
    if r.is_finite() { r * r } else { 0.0 }
}

fn build_modes(config: &MaterialConfig) -> PsimResult<Vec<Mode>> {
    if config.num_bins == 0 || config.branches.is_empty() {
        return Err(PsimError::InvalidTable(format!(
            "material {} needs at least one branch and one bin",
            config.name
        )));
    }

    let mut modes = Vec::with_capacity(config.branches.len() * config.num_bins);
    for branch in &config.branches {
        if !(branch.k_max > 0.0) || !(branch.c1 > 0.0) {
            return Err(PsimError::InvalidTable(format!(
                "material {}: invalid {:?} branch",
                config.name, branch.polarization
            )));
        }
        let dk = branch.k_max / config.num_bins as f64;
        for j in 0..config.num_bins {
            let k = (j as f64 + 0.5) * dk;
            let frequency = branch.c1 * k + branch.c2 * k * k;
            let group_speed = (branch.c1 + 2.0 * branch.c2 * k).max(0.0);
            if frequency <= 0.0 {
                continue;
            }
            modes.push(Mode {
                polarization: branch.polarization,
                frequency,
                group_speed,
                // 2D density of states: k dk / 2pi
                weight: branch.degeneracy * k * dk / (2.0 * PI),
            });
        }
    }
    Ok(modes)
}

fn build_table_set(
    config: &MaterialConfig,
    modes: &[Mode],
    temperature: f64,
) -> PsimResult<TableSet> {
    let n = modes.len();
    let frequencies: Vec<f64> = modes.iter().map(|m| m.frequency).collect();
    let mut energies = Vec::with_capacity(n);
    let mut capacities = Vec::with_capacity(n);
    let mut rates = Vec::with_capacity(n);

    for m in modes {
        let x = HBAR * m.frequency / (BOLTZMANN * temperature);
        energies.push(m.weight * HBAR * m.frequency * occupation(x));
        capacities.push(m.weight * BOLTZMANN * occupation_derivative(x));
        rates.push(config.relaxation.rate(m.frequency, temperature));
    }

    let heat_capacity: f64 = capacities.iter().sum();
    let theoretical_energy: f64 = energies.iter().sum();
    let emit_energy: f64 = energies
        .iter()
        .zip(modes)
        .map(|(e, m)| e * m.group_speed)
        .sum::<f64>()
        / PI;

    let base = SamplingTable::from_weights(&frequencies, &capacities)?;
    let scatter_weights: Vec<f64> = capacities.iter().zip(&rates).map(|(c, r)| c * r).collect();
    let scatter = if scatter_weights.iter().any(|&w| w > 0.0) {
        SamplingTable::from_weights(&frequencies, &scatter_weights)?
    } else {
        base.clone()
    };
    let emit_weights: Vec<f64> = capacities
        .iter()
        .zip(modes)
        .map(|(c, m)| c * m.group_speed)
        .collect();
    let emit = SamplingTable::from_weights(&frequencies, &emit_weights)?;

    let relaxation_times: Vec<f64> = rates
        .iter()
        .map(|&r| if r > 0.0 { 1.0 / r } else { f64::INFINITY })
        .collect();

    Ok(TableSet {
        base: Arc::new(base),
        scatter: Arc::new(scatter),
        emit: Arc::new(emit),
        heat_capacity,
        emit_energy,
        theoretical_energy,
        relaxation_times: Arc::from(relaxation_times),
    })
}

impl Material {
    /// Discretizes the dispersion branches and tabulates every property on
    /// the configured temperature grid.
    pub fn from_config(config: &MaterialConfig) -> PsimResult<Self> {
        let grid = TemperatureGrid::new(config.t_min, config.t_max, config.t_step)?;
        let modes = build_modes(config)?;
        let tables = grid
            .temperatures()
            .map(|t| build_table_set(config, &modes, t))
            .collect::<PsimResult<Vec<_>>>()?;
        Material::from_tables(&config.name, modes, grid, tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_silicon() -> MaterialConfig {
        let mut c = MaterialConfig::silicon();
        c.num_bins = 50;
        c.t_min = 200.0;
        c.t_max = 400.0;
        c.t_step = 5.0;
        c
    }

    #[test]
    fn test_occupation_limits() {
        // Classical limit: n ~ 1/x for small x
        assert!((occupation(1e-4) - 1e4).abs() / 1e4 < 1e-3);
        assert!((occupation_derivative(1e-6) - 1.0).abs() < 1e-9);
        assert_eq!(occupation_derivative(5000.0), 0.0);
        assert!(occupation(5000.0).abs() < 1e-300);
    }

    #[test]
    fn test_modes_have_positive_frequency() {
        let c = small_silicon();
        let modes = build_modes(&c).unwrap();
        assert_eq!(modes.len(), 100);
        for m in &modes {
            assert!(m.frequency > 0.0);
            assert!(m.group_speed >= 0.0);
            assert!(m.weight > 0.0);
        }
    }

    #[test]
    fn test_silicon_tables_are_valid() {
        let m = Material::from_config(&small_silicon()).unwrap();
        for t in [200.0, 300.0, 400.0] {
            let (base, c) = m.base_table(t).unwrap();
            let scatter = m.scatter_table(t).unwrap();
            let (emit, flux) = m.emit_data(t).unwrap();
            for table in [&base, &scatter, &emit] {
                let entries = table.entries();
                assert_eq!(entries.len(), m.modes().len());
                assert!(entries.windows(2).all(|w| w[0].cumulative <= w[1].cumulative));
                assert_eq!(entries.last().unwrap().cumulative, 1.0);
            }
            assert!(c > 0.0);
            assert!(flux > 0.0);
        }
    }

    #[test]
    fn test_energy_and_capacity_increase_with_temperature() {
        let m = Material::from_config(&small_silicon()).unwrap();
        let mut prev_e = 0.0;
        let mut prev_c = 0.0;
        for t in [200.0, 250.0, 300.0, 350.0, 400.0] {
            let e = m.theoretical_energy(t).unwrap();
            let c = m.heat_capacity(t).unwrap();
            assert!(e > prev_e);
            assert!(c > prev_c);
            prev_e = e;
            prev_c = c;
        }
    }

    #[test]
    fn test_heat_capacity_matches_energy_derivative() {
        let m = Material::from_config(&small_silicon()).unwrap();
        let de = m.theoretical_energy(305.0).unwrap() - m.theoretical_energy(295.0).unwrap();
        let c = m.heat_capacity(300.0).unwrap();
        assert!((de / 10.0 - c).abs() / c < 1e-2);
    }

    #[test]
    fn test_relaxation_times_shrink_with_temperature() {
        let m = Material::from_config(&small_silicon()).unwrap();
        let cold = m.relaxation_times(200.0).unwrap();
        let hot = m.relaxation_times(400.0).unwrap();
        for (c, h) in cold.iter().zip(hot.iter()) {
            assert!(h < c);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut c = small_silicon();
        c.num_bins = 0;
        assert!(Material::from_config(&c).is_err());

        let mut c = small_silicon();
        c.branches[0].c1 = 0.0;
        assert!(Material::from_config(&c).is_err());
    }
}
