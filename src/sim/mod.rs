pub mod engine;
pub mod materials;
pub mod model;
pub mod phonon;
pub mod sensor;
