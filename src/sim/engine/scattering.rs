use rand::Rng;

use crate::sim::materials::Material;
use crate::sim::phonon::Phonon;
use crate::sim::sensor::SensorTables;

use super::reflection::isotropic;

/// Probability that a phonon with relaxation time `tau` scatters within `dt`.
pub fn scatter_probability(dt: f64, tau: f64) -> f64 {
    if !(tau > 0.0) {
        return 1.0;
    }
    -(-dt / tau).exp_m1()
}

/// Relaxation-time scattering of one phonon against the tables of the
/// sensor owning its cell.
///
/// A scattered phonon takes a new mode from the scatter table and a new
/// isotropic direction. The sign is kept. Returns `true` if it scattered.
pub fn scatter<R: Rng + ?Sized>(
    phonon: &mut Phonon,
    dt: f64,
    tables: &SensorTables,
    material: &Material,
    rng: &mut R,
) -> bool {
    let tau = tables
        .relaxation_times
        .get(phonon.mode())
        .copied()
        .unwrap_or(f64::INFINITY);
    if rng.r#gen::<f64>() >= scatter_probability(dt, tau) {
        return false;
    }

    let mode = tables.scatter_table.draw_index(rng);
    if let Some(m) = material.mode(mode) {
        phonon.set_mode(mode, m.group_speed);
    }
    phonon.set_direction(isotropic(rng));
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::materials::MaterialConfig;
    use crate::sim::phonon::Sign;
    use crate::sim::sensor::{Sensor, TemperaturePolicy};
    use crate::{Point, Vector};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn silicon_sensor() -> Sensor {
        let mut c = MaterialConfig::silicon();
        c.num_bins = 50;
        c.t_min = 200.0;
        c.t_max = 400.0;
        let material = Arc::new(Material::from_config(&c).unwrap());
        Sensor::new(0, material, 300.0, TemperaturePolicy::Linearized).unwrap()
    }

    #[test]
    fn test_probability_limits() {
        assert_eq!(scatter_probability(1.0, f64::INFINITY), 0.0);
        assert_eq!(scatter_probability(1.0, 0.0), 1.0);
        let p = scatter_probability(1e-12, 1e-12);
        assert!((p - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_no_scattering_with_infinite_tau() {
        let material = crate::sim::materials::tests::constant_material(1.0);
        let sensor =
            Sensor::new(0, Arc::new(material), 300.0, TemperaturePolicy::Linearized).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut p =
            Phonon::new(Point::new(0.0, 0.0), Vector::new(1.0, 0.0), 1.0, Sign::Positive, 0, 0);
        for _ in 0..100 {
            assert!(!scatter(&mut p, 1.0, sensor.tables(), sensor.material(), &mut rng));
        }
        assert_eq!(p.direction(), (1.0, 0.0));
    }

    #[test]
    fn test_scattering_keeps_sign_and_resamples_mode() {
        let sensor = silicon_sensor();
        let material = sensor.material();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        // A time step far beyond every relaxation time forces scattering
        let dt = 1.0;
        let mut p =
            Phonon::new(Point::new(0.0, 0.0), Vector::new(1.0, 0.0), 1.0, Sign::Negative, 0, 0);
        let mut scattered = 0;
        for _ in 0..200 {
            if scatter(&mut p, dt, sensor.tables(), material, &mut rng) {
                scattered += 1;
            }
            assert_eq!(p.sign(), -1);
            let mode = material.mode(p.mode()).unwrap();
            assert_eq!(p.speed(), mode.group_speed);
            let (dx, dy) = p.direction();
            assert!(((dx * dx + dy * dy).sqrt() - 1.0).abs() < 1e-9);
        }
        assert!(scattered > 190);
    }
}
