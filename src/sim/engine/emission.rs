//! Creation of deviational phonons: emission from fixed-temperature
//! surfaces every step, and the initial population of cells whose starting
//! temperature differs from the equilibrium temperature.

use std::sync::Arc;

use rand::Rng;

use crate::error::PsimResult;
use crate::geom::rectangle::Side;
use crate::sim::materials::{Material, SamplingTable};
use crate::sim::phonon::{Phonon, Sign};
use crate::sim::sensor::Sensor;
use crate::{Point, Vector};

use super::Cell;
use super::reflection::{isotropic, lambertian};

/// An emitting side of a cell.
#[derive(Debug, Clone)]
pub struct EmitSource {
    pub cell: usize,
    pub side: Side,
    pub temperature: f64,
    length: f64,
    table: Arc<SamplingTable>,
    /// Emitted energy flux per unit length relative to `t_eq`.
    deviational_flux: f64,
    material: Arc<Material>,
    /// Fractional phonon count left over from previous steps.
    carry: f64,
}

impl EmitSource {
    /// Source on `side` of `cell` (index `cell_idx`) held at `temperature`,
    /// emitting the material of `sensor`, the sensor owning the cell.
    pub fn new(
        cell_idx: usize,
        cell: &Cell,
        side: Side,
        temperature: f64,
        sensor: &Sensor,
        t_eq: f64,
    ) -> PsimResult<Self> {
        let (table, flux) = sensor.get_emit_data(temperature)?;
        let (_, flux_eq) = sensor.get_emit_data(t_eq)?;
        Ok(Self {
            cell: cell_idx,
            side,
            temperature,
            length: cell.rect.side_length(side),
            table,
            deviational_flux: flux - flux_eq,
            material: Arc::clone(sensor.material()),
            carry: 0.0,
        })
    }

    /// Signed deviational energy leaving the surface during `dt`.
    pub fn deviational_energy(&self, dt: f64) -> f64 {
        self.deviational_flux * self.length * dt
    }

    /// Appends this step's phonons to `out` and returns how many were emitted.
    ///
    /// The number emitted is `|energy| / eff_energy`; the fractional part is
    /// carried to the next call so no energy is lost to rounding.
    pub fn emit<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        eff_energy: f64,
        cell: &Cell,
        rng: &mut R,
        out: &mut Vec<Phonon>,
    ) -> usize {
        let energy = self.deviational_energy(dt);
        if !(eff_energy > 0.0) || energy == 0.0 {
            return 0;
        }
        let exact = energy.abs() / eff_energy + self.carry;
        let count = exact.floor();
        self.carry = exact - count;
        let count = count as usize;

        let sign = Sign::of(energy);
        let normal = cell.rect.inward_normal(self.side);
        out.reserve(count);
        for _ in 0..count {
            let mode = self.table.draw_index(rng);
            let Some(m) = self.material.mode(mode) else {
                continue;
            };
            let position = cell.rect.point_on_side(self.side, rng.r#gen::<f64>());
            let direction = lambertian(normal, rng);
            let mut phonon = Phonon::new(position, direction, m.group_speed, sign, mode, self.cell);
            phonon.set_step_fraction(rng.r#gen::<f64>());
            out.push(phonon);
        }
        count
    }
}

/// Deviational energy held by `cell` at the sensor's initial temperature.
pub fn initial_energy(cell: &Cell, sensor: &Sensor, t_eq: f64) -> PsimResult<f64> {
    let material = sensor.material();
    let e0 = material.theoretical_energy(sensor.init_temp())?;
    let e_eq = material.theoretical_energy(t_eq)?;
    Ok((e0 - e_eq) * cell.area())
}

/// Fills `cell` with phonons carrying its initial deviational energy.
///
/// Modes come from the sensor's base table, positions are uniform in the
/// cell and directions isotropic. Returns the number of phonons created.
pub fn seed_cell<R: Rng + ?Sized>(
    cell_idx: usize,
    cell: &Cell,
    sensor: &Sensor,
    t_eq: f64,
    eff_energy: f64,
    rng: &mut R,
    out: &mut Vec<Phonon>,
) -> PsimResult<usize> {
    let energy = initial_energy(cell, sensor, t_eq)?;
    if !(eff_energy > 0.0) || energy == 0.0 {
        return Ok(0);
    }
    let count = (energy.abs() / eff_energy).round() as usize;
    let sign = Sign::of(energy);
    let rect = &cell.rect;
    out.reserve(count);
    for _ in 0..count {
        let mode = sensor.base_table().draw_index(rng);
        let Some(m) = sensor.material().mode(mode) else {
            continue;
        };
        let position = Point::new(
            rect.origin.x + rng.r#gen::<f64>() * rect.length,
            rect.origin.y + rng.r#gen::<f64>() * rect.width,
        );
        let direction: Vector = isotropic(rng);
        out.push(Phonon::new(position, direction, m.group_speed, sign, mode, cell_idx));
    }
    Ok(count)
}
