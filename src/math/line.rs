use glam::{DAffine3, DVec3};

/// An infinite line through two points, used as the pick ray of a
/// selection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: DVec3,
    pub end: DVec3,
}

impl Line {
    #[inline]
    #[must_use]
    pub const fn new(start: DVec3, end: DVec3) -> Self {
        Self { start, end }
    }

    /// Unit direction from `start` towards `end`.
    #[must_use]
    pub fn direction(&self) -> DVec3 {
        (self.end - self.start).normalize_or_zero()
    }

    /// Orthogonal projection of `point` onto the line.
    #[must_use]
    pub fn closest_point(&self, point: DVec3) -> DVec3 {
        let direction = self.end - self.start;
        let length_squared = direction.length_squared();
        if length_squared == 0.0 {
            return self.start;
        }
        let t = (point - self.start).dot(direction) / length_squared;
        self.start + direction * t
    }

    #[must_use]
    pub fn transformed(&self, matrix: &DAffine3) -> Self {
        Self {
            start: matrix.transform_point3(self.start),
            end: matrix.transform_point3(self.end),
        }
    }
}

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    #[must_use]
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    #[must_use]
    pub fn from_line(line: &Line) -> Self {
        Self::new(line.start, line.end - line.start)
    }

    #[inline]
    #[must_use]
    pub fn point_at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }

    /// Distance between `point` and the closest point of the ray.
    #[must_use]
    pub fn distance_to_point(&self, point: DVec3) -> f64 {
        let along = (point - self.origin).dot(self.direction).max(0.0);
        point.distance(self.point_at(along))
    }

    #[must_use]
    pub fn transformed(&self, matrix: &DAffine3) -> Self {
        Self::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }
}

/// A plane in Hessian normal form: all points `p` with `normal · p == dist`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3 {
    pub normal: DVec3,
    pub dist: f64,
}

impl Plane3 {
    #[inline]
    #[must_use]
    pub const fn new(normal: DVec3, dist: f64) -> Self {
        Self { normal, dist }
    }

    /// Signed distance, positive on the side the normal points to.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: DVec3) -> f64 {
        self.normal.dot(point) - self.dist
    }

    /// The same plane facing the other way.
    #[inline]
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(-self.normal, -self.dist)
    }

    /// The plane moved by `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: &DAffine3) -> Self {
        let point = matrix.transform_point3(self.normal * self.dist);
        let normal = (matrix.matrix3.inverse().transpose() * self.normal).normalize_or_zero();
        Self::new(normal, normal.dot(point))
    }

    #[must_use]
    pub fn abs_diff_eq(&self, other: &Plane3, epsilon: f64) -> bool {
        self.normal.abs_diff_eq(other.normal, epsilon) && (self.dist - other.dist).abs() <= epsilon
    }
}
