use serde::{Deserialize, Serialize};

use crate::{Point, Vector};

/// Side of an axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Bottom,
    Top,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Bottom, Side::Top];

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
            Side::Bottom => 2,
            Side::Top => 3,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Top => Side::Bottom,
        }
    }
}

/// Axis-aligned rectangle: `origin` is the lower-left corner,
/// `length` spans x and `width` spans y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub origin: Point,
    pub length: f64,
    pub width: f64,
}

impl Rectangle {
    pub fn new(origin: Point, length: f64, width: f64) -> Self {
        Self {
            origin,
            length,
            width,
        }
    }

    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    pub fn x_max(&self) -> f64 {
        self.origin.x + self.length
    }

    pub fn y_max(&self) -> f64 {
        self.origin.y + self.width
    }

    /// Closed containment test with an absolute margin.
    pub fn contains(&self, pt: Point, margin: f64) -> bool {
        pt.x >= self.origin.x - margin
            && pt.x <= self.x_max() + margin
            && pt.y >= self.origin.y - margin
            && pt.y <= self.y_max() + margin
    }

    pub fn side_length(&self, side: Side) -> f64 {
        match side {
            Side::Left | Side::Right => self.width,
            Side::Bottom | Side::Top => self.length,
        }
    }

    /// Point on `side` at relative position `fraction` in [0, 1].
    pub fn point_on_side(&self, side: Side, fraction: f64) -> Point {
        let f = fraction.clamp(0.0, 1.0);
        match side {
            Side::Left => Point::new(self.origin.x, self.origin.y + f * self.width),
            Side::Right => Point::new(self.x_max(), self.origin.y + f * self.width),
            Side::Bottom => Point::new(self.origin.x + f * self.length, self.origin.y),
            Side::Top => Point::new(self.origin.x + f * self.length, self.y_max()),
        }
    }

    /// Unit normal of `side` pointing into the rectangle.
    pub fn inward_normal(&self, side: Side) -> Vector {
        match side {
            Side::Left => Vector::new(1.0, 0.0),
            Side::Right => Vector::new(-1.0, 0.0),
            Side::Bottom => Vector::new(0.0, 1.0),
            Side::Top => Vector::new(0.0, -1.0),
        }
    }

    /// Pins a point lying (numerically) on `side` exactly onto it.
    pub fn snap_to_side(&self, pt: Point, side: Side) -> Point {
        let x = pt.x.clamp(self.origin.x, self.x_max());
        let y = pt.y.clamp(self.origin.y, self.y_max());
        match side {
            Side::Left => Point::new(self.origin.x, y),
            Side::Right => Point::new(self.x_max(), y),
            Side::Bottom => Point::new(x, self.origin.y),
            Side::Top => Point::new(x, self.y_max()),
        }
    }

    /// Time until a point moving with `velocity` leaves through a side.
    ///
    /// Returns the first side reached and the time to reach it, or `None`
    /// if the velocity is zero. Assumes `position` is inside the rectangle;
    /// a point already on a side and moving outwards exits at time 0.
    pub fn time_to_exit(&self, position: Point, velocity: Vector) -> Option<(Side, f64)> {
        let tx = if velocity.dx > 0.0 {
            Some((Side::Right, (self.x_max() - position.x) / velocity.dx))
        } else if velocity.dx < 0.0 {
            Some((Side::Left, (self.origin.x - position.x) / velocity.dx))
        } else {
            None
        };
        let ty = if velocity.dy > 0.0 {
            Some((Side::Top, (self.y_max() - position.y) / velocity.dy))
        } else if velocity.dy < 0.0 {
            Some((Side::Bottom, (self.origin.y - position.y) / velocity.dy))
        } else {
            None
        };

        let exit = match (tx, ty) {
            (Some(a), Some(b)) => Some(if a.1 <= b.1 { a } else { b }),
            (a, b) => a.or(b),
        };
        exit.map(|(side, t)| (side, t.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Rectangle {
        Rectangle::new(Point::new(0.0, 0.0), 1.0, 1.0)
    }

    #[test]
    fn test_area_and_contains() {
        let r = Rectangle::new(Point::new(1.0, 2.0), 2.0, 0.5);
        assert!((r.area() - 1.0).abs() < 1e-12);
        assert!(r.contains(Point::new(2.0, 2.25), 0.0));
        assert!(r.contains(Point::new(3.0, 2.5), 0.0));
        assert!(!r.contains(Point::new(3.1, 2.5), 0.0));
    }

    #[test]
    fn test_time_to_exit_axis() {
        let r = unit_square();
        let (side, t) = r
            .time_to_exit(Point::new(0.25, 0.5), Vector::new(2.0, 0.0))
            .unwrap();
        assert_eq!(side, Side::Right);
        assert!((t - 0.375).abs() < 1e-12);

        let (side, t) = r
            .time_to_exit(Point::new(0.25, 0.5), Vector::new(0.0, -1.0))
            .unwrap();
        assert_eq!(side, Side::Bottom);
        assert!((t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_to_exit_diagonal_picks_nearest() {
        let r = unit_square();
        let (side, t) = r
            .time_to_exit(Point::new(0.9, 0.1), Vector::new(1.0, 1.0))
            .unwrap();
        assert_eq!(side, Side::Right);
        assert!((t - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_time_to_exit_zero_velocity() {
        assert!(
            unit_square()
                .time_to_exit(Point::new(0.5, 0.5), Vector::new(0.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn test_inward_normals_point_inside() {
        let r = unit_square();
        for side in Side::ALL {
            let p = r.point_on_side(side, 0.5) + r.inward_normal(side) * 0.1;
            assert!(r.contains(p, 0.0));
        }
    }

    #[test]
    fn test_side_lengths() {
        let r = Rectangle::new(Point::new(0.0, 0.0), 3.0, 2.0);
        assert!((r.side_length(Side::Left) - 2.0).abs() < 1e-12);
        assert!((r.side_length(Side::Top) - 3.0).abs() < 1e-12);
        assert_eq!(Side::Left.opposite(), Side::Right);
    }
}
