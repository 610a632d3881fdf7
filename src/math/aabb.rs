use glam::{DAffine3, DVec3};

use super::line::Plane3;

/// Axis-aligned bounding box stored as centre and half-size.
///
/// A box with any negative extent is *invalid* (empty). Including a point
/// into an invalid box yields a zero-sized box around that point, which makes
/// `Aabb::INVALID` the natural seed for accumulating bounds.
///
/// # Corner and face order
///
/// [`Aabb::corners`] and [`Aabb::planes`] use a fixed order that drag-plane
/// selection relies on:
///
/// | Index | Plane | Corners     |
/// |-------|-------|-------------|
/// | 0     | +x    | 1, 2, 5, 6  |
/// | 1     | -x    | 0, 3, 4, 7  |
/// | 2     | +y    | 0, 1, 4, 5  |
/// | 3     | -y    | 2, 3, 6, 7  |
/// | 4     | +z    | 0, 1, 2, 3  |
/// | 5     | -z    | 4, 5, 6, 7  |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub origin: DVec3,
    pub extents: DVec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Aabb {
    /// The empty box.
    pub const INVALID: Self = Self {
        origin: DVec3::ZERO,
        extents: DVec3::splat(-1.0),
    };

    #[inline]
    #[must_use]
    pub const fn new(origin: DVec3, extents: DVec3) -> Self {
        Self { origin, extents }
    }

    #[must_use]
    pub fn from_min_max(min: DVec3, max: DVec3) -> Self {
        Self {
            origin: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    /// Builds the smallest box containing all `points`; invalid if empty.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut aabb = Self::INVALID;
        for point in points {
            aabb.include_point(point);
        }
        aabb
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.extents.x >= 0.0 && self.extents.y >= 0.0 && self.extents.z >= 0.0
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> DVec3 {
        self.origin - self.extents
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> DVec3 {
        self.origin + self.extents
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> DVec3 {
        self.extents * 2.0
    }

    /// Length of the half-diagonal.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.extents.length()
    }

    pub fn include_point(&mut self, point: DVec3) {
        if self.is_valid() {
            *self = Self::from_min_max(self.min().min(point), self.max().max(point));
        } else {
            *self = Self::new(point, DVec3::ZERO);
        }
    }

    pub fn include_aabb(&mut self, other: &Aabb) {
        if !other.is_valid() {
            return;
        }
        if self.is_valid() {
            *self = Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()));
        } else {
            *self = *other;
        }
    }

    #[must_use]
    pub fn union(&self, other: &Aabb) -> Self {
        let mut result = *self;
        result.include_aabb(other);
        result
    }

    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.is_valid() && (point - self.origin).abs().cmple(self.extents).all()
    }

    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.is_valid()
            && other.is_valid()
            && (self.origin - other.origin)
                .abs()
                .cmple(self.extents + other.extents)
                .all()
    }

    /// The eight corners, see the type docs for the order.
    #[must_use]
    pub fn corners(&self) -> [DVec3; 8] {
        let min = self.min();
        let max = self.max();
        [
            DVec3::new(min.x, max.y, max.z),
            DVec3::new(max.x, max.y, max.z),
            DVec3::new(max.x, min.y, max.z),
            DVec3::new(min.x, min.y, max.z),
            DVec3::new(min.x, max.y, min.z),
            DVec3::new(max.x, max.y, min.z),
            DVec3::new(max.x, min.y, min.z),
            DVec3::new(min.x, min.y, min.z),
        ]
    }

    /// The six outward facing planes: +x, -x, +y, -y, +z, -z.
    #[must_use]
    pub fn planes(&self) -> [Plane3; 6] {
        let min = self.min();
        let max = self.max();
        [
            Plane3::new(DVec3::X, max.x),
            Plane3::new(DVec3::NEG_X, -min.x),
            Plane3::new(DVec3::Y, max.y),
            Plane3::new(DVec3::NEG_Y, -min.y),
            Plane3::new(DVec3::Z, max.z),
            Plane3::new(DVec3::NEG_Z, -min.z),
        ]
    }

    /// Bounds of this box after transformation by `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: &DAffine3) -> Self {
        if !self.is_valid() {
            return *self;
        }
        Self::from_points(self.corners().map(|corner| matrix.transform_point3(corner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_point_seeds_invalid_box() {
        let mut aabb = Aabb::INVALID;
        assert!(!aabb.is_valid());
        aabb.include_point(DVec3::new(1.0, 2.0, 3.0));
        assert!(aabb.is_valid());
        assert_eq!(aabb.extents, DVec3::ZERO);
        aabb.include_point(DVec3::new(-1.0, 0.0, 3.0));
        assert_eq!(aabb.min(), DVec3::new(-1.0, 0.0, 3.0));
        assert_eq!(aabb.max(), DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn corners_match_planes() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
        let corners = aabb.corners();
        let planes = aabb.planes();
        let faces: [[usize; 4]; 6] = [
            [1, 2, 5, 6],
            [0, 3, 4, 7],
            [0, 1, 4, 5],
            [2, 3, 6, 7],
            [0, 1, 2, 3],
            [4, 5, 6, 7],
        ];
        for (plane, corner_indices) in planes.iter().zip(faces) {
            for index in corner_indices {
                assert!(plane.distance_to_point(corners[index]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn union_ignores_invalid() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert_eq!(a.union(&Aabb::INVALID), a);
        assert_eq!(Aabb::INVALID.union(&a), a);
    }
}
