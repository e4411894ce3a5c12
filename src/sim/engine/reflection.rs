use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Vector;

/// Defines how phonons leave a reflecting wall.
pub trait ReflectionModel {
    /// Computes the outgoing direction given the incident direction and the
    /// wall normal pointing into the cell.
    fn reflect<R: Rng + ?Sized>(&self, incident: Vector, normal: Vector, rng: &mut R) -> Vector;
}

/// Perfect specular (mirror) reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specular;

impl ReflectionModel for Specular {
    fn reflect<R: Rng + ?Sized>(&self, incident: Vector, normal: Vector, _rng: &mut R) -> Vector {
        let dot = incident.dot(normal);
        incident - 2.0 * dot * normal
    }
}

/// Lambertian diffuse reflection: in 2D the outgoing angle `theta` from the
/// normal has density `cos(theta) / 2`, sampled as `sin(theta) = 2u - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diffuse;

impl ReflectionModel for Diffuse {
    fn reflect<R: Rng + ?Sized>(&self, _incident: Vector, normal: Vector, rng: &mut R) -> Vector {
        lambertian(normal, rng)
    }
}

/// Cosine-weighted direction in the half plane of `normal`.
pub fn lambertian<R: Rng + ?Sized>(normal: Vector, rng: &mut R) -> Vector {
    let s: f64 = 2.0 * rng.r#gen::<f64>() - 1.0;
    let c = (1.0 - s * s).max(0.0).sqrt();
    let tangent = Vector::new(-normal.dy, normal.dx);
    normal * c + tangent * s
}

/// Uniformly distributed unit direction.
pub fn isotropic<R: Rng + ?Sized>(rng: &mut R) -> Vector {
    Vector::from_angle(2.0 * PI * rng.r#gen::<f64>())
}

/// Wall reflection kind, selectable per surface in the model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reflection {
    #[default]
    Specular,
    Diffuse,
}

impl ReflectionModel for Reflection {
    fn reflect<R: Rng + ?Sized>(&self, incident: Vector, normal: Vector, rng: &mut R) -> Vector {
        match self {
            Reflection::Specular => Specular.reflect(incident, normal, rng),
            Reflection::Diffuse => Diffuse.reflect(incident, normal, rng),
        }
    }
}
