use std::ops::Add;

use rand::Rng;
use rayon::prelude::*;

use crate::sim::phonon::Phonon;
use crate::sim::sensor::Sensor;

use super::reflection::ReflectionModel;
use super::rng::{RngStreams, SimRng};
use super::scattering::scatter;
use super::{Domain, ExecutionMode, Surface};

/// Wall events a single phonon may undergo in one step before it is discarded.
pub const MAX_WALL_EVENTS: usize = 1000;

/// Phonons per work unit. Each chunk owns one random stream, so the draws
/// do not depend on how chunks are scheduled.
pub const CHUNK: usize = 4096;

/// Counters gathered during one transport step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub scattered: usize,
    pub absorbed: usize,
    pub discarded: usize,
}

impl Add for StepStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            scattered: self.scattered + other.scattered,
            absorbed: self.absorbed + other.absorbed,
            discarded: self.discarded + other.discarded,
        }
    }
}

/// How a call to [`advance`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftOutcome {
    /// Still inside the domain after drifting the full time.
    Moved,
    /// Reached an emitting surface and was absorbed.
    Absorbed,
    /// Exceeded [`MAX_WALL_EVENTS`] and was removed.
    Discarded,
}

/// Drifts a phonon for its share of `dt` through the cells of `domain`,
/// handling every wall it meets on the way.
///
/// The share is `dt * step_fraction`; the fraction is reset to 1 afterwards
/// so freshly emitted phonons only drift part of their first step.
pub fn advance<R: Rng + ?Sized>(
    phonon: &mut Phonon,
    dt: f64,
    domain: &Domain,
    rng: &mut R,
) -> DriftOutcome {
    let mut remaining = dt * phonon.step_fraction();
    phonon.set_step_fraction(1.0);

    let mut events = 0;
    while remaining > 0.0 {
        let Some(cell) = domain.cells.get(phonon.cell()) else {
            phonon.kill();
            return DriftOutcome::Discarded;
        };
        let Some((side, t)) = cell.rect.time_to_exit(phonon.position(), phonon.velocity()) else {
            break;
        };
        if t >= remaining {
            phonon.drift(remaining);
            break;
        }

        phonon.drift(t);
        remaining -= t;
        phonon.set_position(cell.rect.snap_to_side(phonon.position(), side));

        events += 1;
        if events > MAX_WALL_EVENTS {
            log::warn!(
                "Discarding phonon stuck in cell {} after {MAX_WALL_EVENTS} wall events",
                phonon.cell()
            );
            phonon.kill();
            return DriftOutcome::Discarded;
        }

        match cell.surface(side) {
            Surface::Boundary(reflection) => {
                let normal = cell.rect.inward_normal(side);
                let out = reflection.reflect(phonon.direction_vector(), normal, rng);
                phonon.set_direction(out);
            }
            Surface::Emit { .. } => {
                phonon.kill();
                return DriftOutcome::Absorbed;
            }
            Surface::Transition { target } => phonon.set_cell(target),
        }
    }
    DriftOutcome::Moved
}

fn update_chunk(
    phonons: &mut [Phonon],
    dt: f64,
    domain: &Domain,
    sensors: &[Sensor],
    rng: &mut SimRng,
) -> StepStats {
    let mut stats = StepStats::default();
    for phonon in phonons.iter_mut().filter(|p| p.is_alive()) {
        match advance(phonon, dt, domain, rng) {
            DriftOutcome::Absorbed => stats.absorbed += 1,
            DriftOutcome::Discarded => stats.discarded += 1,
            DriftOutcome::Moved => {
                let sensor = &sensors[domain.cells[phonon.cell()].sensor];
                if scatter(phonon, dt, sensor.tables(), sensor.material(), rng) {
                    stats.scattered += 1;
                }
            }
        }
    }
    stats
}

/// Moves and scatters every live phonon for one time step.
///
/// Scattering uses the tables the owning sensors cached at the end of the
/// previous step; sensors are only read here.
pub fn transport_step(
    phonons: &mut [Phonon],
    dt: f64,
    domain: &Domain,
    sensors: &[Sensor],
    streams: &mut RngStreams,
    mode: ExecutionMode,
) -> StepStats {
    let mut rngs = streams.split(phonons.len().div_ceil(CHUNK));
    match mode {
        ExecutionMode::Serial => phonons
            .chunks_mut(CHUNK)
            .zip(rngs.iter_mut())
            .map(|(chunk, rng)| update_chunk(chunk, dt, domain, sensors, rng))
            .fold(StepStats::default(), Add::add),
        ExecutionMode::Parallel => phonons
            .par_chunks_mut(CHUNK)
            .zip(rngs.par_iter_mut())
            .map(|(chunk, rng)| update_chunk(chunk, dt, domain, sensors, rng))
            .reduce(StepStats::default, Add::add),
    }
}
