pub mod emission;
pub mod reflection;
pub mod rng;
pub mod scattering;
pub mod transport;

use serde::{Deserialize, Serialize};

use crate::error::{PsimError, PsimResult};
use crate::geom::rectangle::{Rectangle, Side};

use self::reflection::Reflection;

/// Relative tolerance used when matching shared sides of adjacent cells.
const SIDE_TOL: f64 = 1e-9;

/// What happens to a phonon reaching a side of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    /// Reflecting wall.
    Boundary(Reflection),
    /// Wall held at a fixed temperature. Emits phonons and absorbs every
    /// phonon reaching it.
    Emit { temperature: f64 },
    /// Open side shared with another cell.
    Transition { target: usize },
}

/// Rectangular region of the domain with one surface per side.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub rect: Rectangle,
    /// Index of the sensor measuring this cell.
    pub sensor: usize,
    /// Surfaces indexed by [`Side::index`].
    pub surfaces: [Surface; 4],
}

impl Cell {
    pub fn surface(&self, side: Side) -> Surface {
        self.surfaces[side.index()]
    }

    pub fn area(&self) -> f64 {
        self.rect.area()
    }
}

/// Flat list of cells with validated transitions, indexed during transport.
#[derive(Debug, Clone)]
pub struct Domain {
    pub cells: Vec<Cell>,
}

/// How the per-step phonon update is executed.
///
/// Both modes draw identical random numbers for a given seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

impl Domain {
    /// Creates the domain, checking that every transition side coincides
    /// with the opposite side of its target cell.
    pub fn new(cells: Vec<Cell>) -> PsimResult<Self> {
        for (i, cell) in cells.iter().enumerate() {
            if !(cell.rect.length > 0.0) || !(cell.rect.width > 0.0) {
                return Err(PsimError::InvalidGeometry(format!(
                    "cell {i} has non-positive size {} x {}",
                    cell.rect.length, cell.rect.width
                )));
            }
            for side in Side::ALL {
                if let Surface::Transition { target } = cell.surface(side) {
                    let other = cells.get(target).ok_or_else(|| {
                        PsimError::InvalidGeometry(format!(
                            "cell {i} {side:?} side points to missing cell {target}"
                        ))
                    })?;
                    if target == i || !sides_match(&cell.rect, side, &other.rect) {
                        return Err(PsimError::InvalidGeometry(format!(
                            "cell {i} {side:?} side does not coincide with cell {target}"
                        )));
                    }
                }
            }
        }
        Ok(Self { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// True if `side` of `a` and the opposite side of `b` are the same segment.
fn sides_match(a: &Rectangle, side: Side, b: &Rectangle) -> bool {
    let opposite = side.opposite();
    let scale = a.length.max(a.width).max(b.length).max(b.width);
    let tol = SIDE_TOL * scale;
    let a0 = a.point_on_side(side, 0.0);
    let a1 = a.point_on_side(side, 1.0);
    let b0 = b.point_on_side(opposite, 0.0);
    let b1 = b.point_on_side(opposite, 1.0);
    (a0.x - b0.x).abs() <= tol
        && (a0.y - b0.y).abs() <= tol
        && (a1.x - b1.x).abs() <= tol
        && (a1.y - b1.y).abs() <= tol
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Point;

    /// Row of `n` unit cells along x, each measured by its own sensor.
    /// The outer left/right sides use the given surfaces, top/bottom reflect.
    pub(crate) fn row(n: usize, left: Surface, right: Surface) -> Domain {
        let cells = (0..n)
            .map(|i| {
                let mut surfaces = [Surface::Boundary(Reflection::Specular); 4];
                surfaces[Side::Left.index()] = if i == 0 {
                    left
                } else {
                    Surface::Transition { target: i - 1 }
                };
                surfaces[Side::Right.index()] = if i + 1 == n {
                    right
                } else {
                    Surface::Transition { target: i + 1 }
                };
                Cell {
                    rect: Rectangle::new(Point::new(i as f64, 0.0), 1.0, 1.0),
                    sensor: i,
                    surfaces,
                }
            })
            .collect();
        Domain::new(cells).unwrap()
    }

    #[test]
    fn test_row_is_valid() {
        let d = row(
            3,
            Surface::Emit { temperature: 310.0 },
            Surface::Emit { temperature: 290.0 },
        );
        assert_eq!(d.len(), 3);
        assert_eq!(
            d.cells[1].surface(Side::Left),
            Surface::Transition { target: 0 }
        );
    }

    #[test]
    fn test_transition_must_share_side() {
        let walls = [Surface::Boundary(Reflection::Specular); 4];
        let mut a = Cell {
            rect: Rectangle::new(Point::new(0.0, 0.0), 1.0, 1.0),
            sensor: 0,
            surfaces: walls,
        };
        a.surfaces[Side::Right.index()] = Surface::Transition { target: 1 };
        let b = Cell {
            rect: Rectangle::new(Point::new(1.5, 0.0), 1.0, 1.0),
            sensor: 0,
            surfaces: walls,
        };
        let err = Domain::new(vec![a.clone(), b]).unwrap_err();
        assert!(matches!(err, PsimError::InvalidGeometry(_)));

        let missing = Domain::new(vec![a]).unwrap_err();
        assert!(matches!(missing, PsimError::InvalidGeometry(_)));
    }

    #[test]
    fn test_rejects_empty_cell() {
        let cell = Cell {
            rect: Rectangle::new(Point::new(0.0, 0.0), 0.0, 1.0),
            sensor: 0,
            surfaces: [Surface::Boundary(Reflection::Diffuse); 4],
        };
        assert!(Domain::new(vec![cell]).is_err());
    }
}
