use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rayon::prelude::*;

use crate::error::PsimError;
use crate::geom::rectangle::{Rectangle, Side};
use crate::sim::engine::emission::{EmitSource, initial_energy, seed_cell};
use crate::sim::engine::rng::RngStreams;
use crate::sim::engine::transport::{StepStats, transport_step};
use crate::sim::engine::{Cell, Domain, ExecutionMode, Surface};
use crate::sim::materials::Material;
use crate::sim::phonon::Phonon;
use crate::sim::sensor::Sensor;

use super::config::{ModelConfig, SurfaceConfig};
use super::result::{SensorRecord, SimulationResult};

#[derive(Debug, Clone, Copy)]
pub struct SimulationProgress {
    /// Number of completed steps (0..=num_steps).
    pub steps_done: usize,
    /// Target number of steps from the configuration (may stop early).
    pub num_steps: usize,
    /// Simulated time elapsed (seconds).
    pub sim_time_s: f64,
    /// Live phonons after the last step.
    pub num_phonons: usize,
    /// Largest sensor temperature change over the last step.
    pub max_temperature_change: f64,
}

trait ProgressReporter {
    fn every_steps(&self) -> usize;
    fn report(&mut self, progress: &SimulationProgress);
}

struct NoProgress;
impl ProgressReporter for NoProgress {
    fn every_steps(&self) -> usize {
        0
    }
    fn report(&mut self, _progress: &SimulationProgress) {}
}

struct FnProgress<F> {
    every_steps: usize,
    f: F,
}
impl<F> ProgressReporter for FnProgress<F>
where
    F: FnMut(&SimulationProgress),
{
    fn every_steps(&self) -> usize {
        self.every_steps
    }
    fn report(&mut self, progress: &SimulationProgress) {
        (self.f)(progress);
    }
}

/// A built simulation: domain, sensors, emitting surfaces and the live
/// phonon population, advanced one time step at a time.
pub struct Model {
    config: ModelConfig,
    domain: Domain,
    sensors: Vec<Sensor>,
    sources: Vec<EmitSource>,
    phonons: Vec<Phonon>,
    streams: RngStreams,
    t_eq: f64,
    eff_energy: f64,
    step: usize,
    time: f64,
    stable_steps: usize,
}

impl Model {
    /// Builds materials, sensors and cells, sizes the phonon energy quantum
    /// and seeds the initial population.
    pub fn new(mut config: ModelConfig) -> Result<Self> {
        config.validate().context("Invalid model configuration")?;

        let t_eq = config
            .resolve_equilibrium_temperature()
            .ok_or_else(|| anyhow!("Cannot infer an equilibrium temperature without sensors"))?;
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        config.equilibrium_temperature = Some(t_eq);
        config.seed = Some(seed);

        let materials: HashMap<String, Arc<Material>> = config
            .materials
            .par_iter()
            .map(|m| -> Result<(String, Arc<Material>)> {
                let material = Material::from_config(m)
                    .with_context(|| format!("Failed to build material {}", m.name))?;
                Ok((m.name.clone(), Arc::new(material)))
            })
            .collect::<Result<_>>()?;

        let mut sensors = Vec::with_capacity(config.sensors.len());
        let mut sensor_index = HashMap::new();
        for (idx, sc) in config.sensors.iter().enumerate() {
            let material = materials
                .get(&sc.material)
                .ok_or_else(|| PsimError::UnknownMaterial(sc.material.clone()))?;
            let sensor = Sensor::new(
                sc.id,
                Arc::clone(material),
                sc.init_temp,
                config.temperature_policy,
            )
            .with_context(|| format!("Failed to create sensor {}", sc.id))?;
            sensors.push(sensor);
            sensor_index.insert(sc.id, idx);
        }

        let cells = config
            .cells
            .iter()
            .map(|c| -> Result<Cell> {
                let sensor = *sensor_index
                    .get(&c.sensor)
                    .ok_or_else(|| PsimError::UnknownSensor(c.sensor))?;
                Ok(Cell {
                    rect: Rectangle::new(c.origin, c.length, c.width),
                    sensor,
                    surfaces: c.surfaces().map(surface),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let domain = Domain::new(cells)?;

        for cell in &domain.cells {
            sensors[cell.sensor].add_to_area(cell.area());
        }

        let mut sources = Vec::new();
        for (idx, cell) in domain.cells.iter().enumerate() {
            for side in Side::ALL {
                if let Surface::Emit { temperature } = cell.surface(side) {
                    let source = EmitSource::new(
                        idx,
                        cell,
                        side,
                        temperature,
                        &sensors[cell.sensor],
                        t_eq,
                    )
                    .with_context(|| {
                        format!("Invalid emitting surface on cell {idx} {side:?}")
                    })?;
                    sources.push(source);
                }
            }
        }

        let dt = config.time_step;
        let mut total_energy = 0.0;
        for cell in &domain.cells {
            total_energy += initial_energy(cell, &sensors[cell.sensor], t_eq)?.abs();
        }
        for source in &sources {
            total_energy += source.deviational_energy(dt).abs() * config.num_steps as f64;
        }
        let eff_energy = if total_energy > 0.0 {
            total_energy / config.num_phonons as f64
        } else {
            0.0
        };

        let mut streams = RngStreams::new(seed);
        let mut phonons = Vec::new();
        for (idx, cell) in domain.cells.iter().enumerate() {
            seed_cell(
                idx,
                cell,
                &sensors[cell.sensor],
                t_eq,
                eff_energy,
                streams.master(),
                &mut phonons,
            )?;
        }

        log::info!(
            "Model: {} cells, {} sensors, {} emitting surfaces, t_eq = {t_eq} K, seed = {seed}",
            domain.len(),
            sensors.len(),
            sources.len()
        );
        log::info!(
            "Effective energy {eff_energy:.3e} J for a budget of {} phonons, {} initial phonons",
            config.num_phonons,
            phonons.len()
        );

        Ok(Self {
            config,
            domain,
            sensors,
            sources,
            phonons,
            streams,
            t_eq,
            eff_energy,
            step: 0,
            time: 0.0,
            stable_steps: 0,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn phonons(&self) -> &[Phonon] {
        &self.phonons
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn equilibrium_temperature(&self) -> f64 {
        self.t_eq
    }

    pub fn effective_energy(&self) -> f64 {
        self.eff_energy
    }

    /// Completed steps.
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the simulation by one time step: emission, transport and
    /// scattering, removal of absorbed phonons, then one measurement per
    /// sensor.
    pub fn step(&mut self) -> Result<StepStats> {
        let dt = self.config.time_step;

        let mut emitted = 0;
        for source in &mut self.sources {
            let cell = &self.domain.cells[source.cell];
            emitted += source.emit(
                dt,
                self.eff_energy,
                cell,
                self.streams.master(),
                &mut self.phonons,
            );
        }

        let stats = transport_step(
            &mut self.phonons,
            dt,
            &self.domain,
            &self.sensors,
            &mut self.streams,
            self.config.execution,
        );
        self.phonons.retain(Phonon::is_alive);

        self.measure()
            .with_context(|| format!("Measurement failed at step {}", self.step + 1))?;

        self.step += 1;
        self.time += dt;
        log::debug!(
            "Step {}: emitted {emitted}, absorbed {}, scattered {}, live {}",
            self.step,
            stats.absorbed,
            stats.scattered,
            self.phonons.len()
        );
        Ok(stats)
    }

    /// Hands every sensor the phonons currently inside its cells.
    ///
    /// Sensors are independent of each other, so in parallel mode they are
    /// measured concurrently; the call returns only after all of them are done.
    fn measure(&mut self) -> crate::error::PsimResult<()> {
        let mut groups: Vec<Vec<&Phonon>> = vec![Vec::new(); self.sensors.len()];
        for p in &self.phonons {
            groups[self.domain.cells[p.cell()].sensor].push(p);
        }

        let (eff_energy, t_eq) = (self.eff_energy, self.t_eq);
        match self.config.execution {
            ExecutionMode::Serial => self
                .sensors
                .iter_mut()
                .zip(groups)
                .try_for_each(|(sensor, group)| sensor.take_measurements(group, eff_energy, t_eq)),
            ExecutionMode::Parallel => self
                .sensors
                .par_iter_mut()
                .zip(groups.into_par_iter())
                .try_for_each(|(sensor, group)| sensor.take_measurements(group, eff_energy, t_eq)),
        }
    }

    /// Largest absolute temperature change of any sensor over the last step.
    pub fn max_temperature_change(&self) -> f64 {
        self.sensors
            .iter()
            .filter_map(|s| match s.temperatures() {
                [.., prev, last] => Some((last - prev).abs()),
                [last] => Some((last - s.init_temp()).abs()),
                [] => None,
            })
            .fold(0.0, f64::max)
    }

    /// Updates the steady-state counter; true once the run may stop.
    fn is_steady(&mut self) -> bool {
        let Some(ss) = self.config.steady_state else {
            return false;
        };
        if self.max_temperature_change() <= ss.tolerance {
            self.stable_steps += 1;
        } else {
            self.stable_steps = 0;
        }
        self.stable_steps >= ss.window
    }

    fn progress(&self) -> SimulationProgress {
        SimulationProgress {
            steps_done: self.step,
            num_steps: self.config.num_steps,
            sim_time_s: self.time,
            num_phonons: self.phonons.len(),
            max_temperature_change: self.max_temperature_change(),
        }
    }

    pub fn run(self) -> Result<SimulationResult> {
        self.run_inner(NoProgress)
    }

    /// Runs the simulation while periodically reporting progress.
    ///
    /// - `every_steps=0` disables progress reporting.
    /// - The reporter is called once at start (`steps_done=0`) and then every `every_steps`,
    ///   plus once at the end (or early-termination step).
    pub fn run_with_progress<F>(self, every_steps: usize, report: F) -> Result<SimulationResult>
    where
        F: FnMut(&SimulationProgress),
    {
        self.run_inner(FnProgress {
            every_steps,
            f: report,
        })
    }

    /// Runs to completion and writes the results to `dir`
    /// (`results.json` and one CSV per sensor).
    pub fn run_simulation(self, dir: &Path) -> Result<SimulationResult> {
        let result = self.run()?;
        crate::io::write_results(dir, &result)?;
        Ok(result)
    }

    fn run_inner<R: ProgressReporter>(mut self, mut reporter: R) -> Result<SimulationResult> {
        let num_steps = self.config.num_steps;
        let report_every = reporter.every_steps();
        if report_every > 0 {
            reporter.report(&self.progress());
        }

        let mut stopped_early = false;
        while self.step < num_steps {
            self.step()?;
            let steady = self.is_steady();
            let last = steady || self.step == num_steps;
            if report_every > 0 && (self.step.is_multiple_of(report_every) || last) {
                reporter.report(&self.progress());
            }
            if steady && self.step < num_steps {
                log::info!("Steady state reached after {} steps", self.step);
                stopped_early = true;
                break;
            }
        }

        log::info!(
            "Finished {} steps ({:.3e} s simulated), {} live phonons",
            self.step,
            self.time,
            self.phonons.len()
        );
        Ok(self.into_result(stopped_early))
    }

    fn into_result(self, stopped_early: bool) -> SimulationResult {
        let sensors = self
            .sensors
            .iter()
            .map(|s| SensorRecord {
                id: s.id(),
                area: s.area_covered(),
                measurements: s.get_measurements(),
            })
            .collect();
        SimulationResult {
            run_id: SimulationResult::new_run_id(),
            config: self.config,
            steps: self.step,
            stopped_early,
            effective_energy: self.eff_energy,
            equilibrium_temperature: self.t_eq,
            sensors,
        }
    }
}

fn surface(config: SurfaceConfig) -> Surface {
    match config {
        SurfaceConfig::Boundary { reflection } => Surface::Boundary(reflection),
        SurfaceConfig::Emit { temperature } => Surface::Emit { temperature },
        SurfaceConfig::Transition { cell } => Surface::Transition { target: cell },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::model::config::tests::bar;
    use crate::sim::model::config::SteadyStateConfig;
    use crate::sim::sensor::{EnergyBalance, TemperaturePolicy};

    #[test]
    fn test_unknown_references_are_typed() {
        let mut config = bar();
        config.sensors[0].material = "diamond".to_string();
        let Err(err) = Model::new(config) else {
            panic!("model with an unknown material was accepted");
        };
        assert_eq!(
            err.downcast_ref::<PsimError>(),
            Some(&PsimError::UnknownMaterial("diamond".to_string()))
        );

        let mut config = bar();
        config.cells[1].sensor = 42;
        let Err(err) = Model::new(config) else {
            panic!("model with an unknown sensor was accepted");
        };
        assert_eq!(err.downcast_ref::<PsimError>(), Some(&PsimError::UnknownSensor(42)));
    }

    #[test]
    fn test_areas_are_registered() -> Result<()> {
        let model = Model::new(bar())?;
        for s in model.sensors() {
            assert!((s.area_covered() - 1e-14).abs() < 1e-26);
        }
        assert!(model.effective_energy() > 0.0);
        assert_eq!(model.config().seed, Some(7));
        assert_eq!(model.config().equilibrium_temperature, Some(300.0));
        Ok(())
    }

    #[test]
    fn test_no_initial_phonons_at_equilibrium() -> Result<()> {
        let model = Model::new(bar())?;
        assert!(model.phonons().is_empty());
        Ok(())
    }

    #[test]
    fn test_initial_population_matches_budget() -> Result<()> {
        let mut config = bar();
        for s in &mut config.sensors {
            s.init_temp = 305.0;
        }
        for c in &mut config.cells {
            c.left = SurfaceConfig::default();
            c.right = SurfaceConfig::default();
        }
        config.cells[0].right = SurfaceConfig::Transition { cell: 1 };
        config.cells[1].left = SurfaceConfig::Transition { cell: 0 };
        config.equilibrium_temperature = Some(300.0);
        let model = Model::new(config)?;
        // Only initial energy: the whole budget is seeded at once.
        let n = model.phonons().len() as i64;
        assert!((n - 5000).abs() <= 2);
        assert!(model.phonons().iter().all(|p| p.sign() == 1));
        Ok(())
    }

    #[test]
    fn test_step_keeps_series_aligned() -> Result<()> {
        let mut model = Model::new(bar())?;
        for i in 1..=5 {
            model.step()?;
            assert_eq!(model.step_count(), i);
            for s in model.sensors() {
                assert_eq!(s.temperatures().len(), i);
                assert_eq!(s.x_fluxes().len(), i);
                assert_eq!(s.y_fluxes().len(), i);
            }
        }
        assert!((model.time() - 5.0 * 2e-12).abs() < 1e-20);
        assert!(!model.phonons().is_empty());
        assert!(model.phonons().iter().all(|p| p.is_alive()));
        Ok(())
    }

    #[test]
    fn test_hot_side_warms_first() -> Result<()> {
        let result = Model::new(bar())?.run()?;
        assert_eq!(result.steps, 20);
        let hot = result.sensor(0).unwrap();
        let cold = result.sensor(1).unwrap();
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        assert!(mean(&hot.measurements.temperatures) > 300.0);
        assert!(mean(&cold.measurements.temperatures) < 300.0);
        assert!(mean(&hot.measurements.x_fluxes) > 0.0);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_result() -> Result<()> {
        let a = Model::new(bar())?.run()?;
        let b = Model::new(bar())?.run()?;
        assert_eq!(a.sensors, b.sensors);
        assert_ne!(a.run_id, b.run_id);
        Ok(())
    }

    #[test]
    fn test_serial_and_parallel_agree() -> Result<()> {
        let serial = Model::new(bar())?.run()?;
        let mut config = bar();
        config.execution = ExecutionMode::Parallel;
        let parallel = Model::new(config)?.run()?;
        assert_eq!(serial.sensors, parallel.sensors);
        Ok(())
    }

    #[test]
    fn test_equal_temperatures_give_flat_profile() -> Result<()> {
        let mut config = bar();
        for c in &mut config.cells {
            for s in [&mut c.left, &mut c.right] {
                if let SurfaceConfig::Emit { temperature } = s {
                    *temperature = 300.0;
                }
            }
        }
        let result = Model::new(config)?.run()?;
        assert_eq!(result.effective_energy, 0.0);
        for s in &result.sensors {
            assert!(s.measurements.temperatures.iter().all(|&t| t == 300.0));
            assert!(s.measurements.x_fluxes.iter().all(|&f| f == 0.0));
        }
        Ok(())
    }

    #[test]
    fn test_steady_state_stops_early() -> Result<()> {
        let mut config = bar();
        for c in &mut config.cells {
            for s in [&mut c.left, &mut c.right] {
                if let SurfaceConfig::Emit { temperature } = s {
                    *temperature = 300.0;
                }
            }
        }
        config.steady_state = Some(SteadyStateConfig {
            tolerance: 1e-9,
            window: 3,
        });
        let result = Model::new(config)?.run()?;
        assert!(result.stopped_early);
        assert_eq!(result.steps, 3);
        Ok(())
    }

    #[test]
    fn test_progress_reporting() -> Result<()> {
        let mut seen = Vec::new();
        Model::new(bar())?.run_with_progress(7, |p| seen.push(p.steps_done))?;
        assert_eq!(seen, vec![0, 7, 14, 20]);
        Ok(())
    }

    #[test]
    fn test_bisection_policy_runs() -> Result<()> {
        let policy = TemperaturePolicy::bisection_with(EnergyBalance::Deviational);
        let mut config = bar();
        config.temperature_policy = policy;
        let result = Model::new(config)?.run()?;
        assert_eq!(result.config.temperature_policy, policy);
        for (_, t) in result.final_temperatures() {
            assert!(t > 250.0 && t < 350.0);
        }
        Ok(())
    }
}
