pub mod point;
pub mod rectangle;
pub mod vector;

/// Geometric precision
const EPS: f64 = 1e-12;
