use crate::{Point, Vector};

/// Tolerance used when checking that a direction is a unit vector.
const UNIT_TOL: f64 = 1e-9;

/// Whether a phonon carries energy above (+) or below (-) the equilibrium baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn value(self) -> i32 {
        match self {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }

    /// Sign of an energy deviation; zero counts as positive.
    pub fn of(deviation: f64) -> Self {
        if deviation < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

/// A deviational energy carrier.
///
/// Direction is always a unit vector and speed is non-negative; both are
/// only changed by the transport step.
#[derive(Debug, Clone, PartialEq)]
pub struct Phonon {
    position: Point,
    direction: Vector,
    speed: f64,
    sign: Sign,
    mode: usize,
    cell: usize,
    /// Fraction of the next time step the phonon still has to drift.
    step_fraction: f64,
    alive: bool,
}

impl Phonon {
    pub fn new(
        position: Point,
        direction: Vector,
        speed: f64,
        sign: Sign,
        mode: usize,
        cell: usize,
    ) -> Self {
        let direction = direction.normalize().unwrap_or(Vector::new(1.0, 0.0));
        debug_assert!(speed >= 0.0 && speed.is_finite(), "invalid speed {speed}");
        Self {
            position,
            direction,
            speed: speed.max(0.0),
            sign,
            mode,
            cell,
            step_fraction: 1.0,
            alive: true,
        }
    }

    pub fn sign(&self) -> i32 {
        self.sign.value()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Unit direction components `(dx, dy)`.
    pub fn direction(&self) -> (f64, f64) {
        (self.direction.dx, self.direction.dy)
    }

    pub fn direction_vector(&self) -> Vector {
        self.direction
    }

    pub fn velocity(&self) -> Vector {
        self.direction * self.speed
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn step_fraction(&self) -> f64 {
        self.step_fraction
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Sets a new direction; zero-length vectors leave the direction unchanged.
    pub fn set_direction(&mut self, direction: Vector) {
        if let Some(d) = direction.normalize() {
            self.direction = d;
        }
        debug_assert!(self.direction.is_unit(UNIT_TOL));
    }

    pub fn set_mode(&mut self, mode: usize, speed: f64) {
        debug_assert!(speed >= 0.0 && speed.is_finite(), "invalid speed {speed}");
        self.mode = mode;
        self.speed = speed.max(0.0);
    }

    pub fn set_cell(&mut self, cell: usize) {
        self.cell = cell;
    }

    pub fn set_step_fraction(&mut self, fraction: f64) {
        self.step_fraction = fraction.clamp(0.0, 1.0);
    }

    /// Moves the phonon in a straight line for `dt` seconds.
    pub fn drift(&mut self, dt: f64) {
        self.position = self.position + self.velocity() * dt;
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }
}
