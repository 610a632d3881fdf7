//! Selection tests and selector sinks.
//!
//! Nodes perform the intersection math against a [`SelectionTest`] and
//! report hits to a [`Selector`]. Ordering and occlusion are the selector's
//! business: [`SelectionPool`] keeps every candidate together with its
//! closest intersection and picks the nearest one on request.

use std::cmp::Ordering;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::selectable::ObservedSelectable;
use crate::math::{Aabb, Line};

/// Where along the pick ray a hit happened.
///
/// `depth` is the distance along the ray, `distance` the perpendicular
/// distance between the ray and the hit geometry. Smaller depth wins, then
/// smaller distance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectionIntersection {
    pub depth: f64,
    pub distance: f64,
}

impl SelectionIntersection {
    #[inline]
    #[must_use]
    pub const fn new(depth: f64, distance: f64) -> Self {
        Self { depth, distance }
    }

    #[must_use]
    pub fn cmp_closeness(&self, other: &Self) -> Ordering {
        self.depth
            .total_cmp(&other.depth)
            .then(self.distance.total_cmp(&other.distance))
    }

    #[inline]
    #[must_use]
    pub fn is_closer_than(&self, other: &Self) -> bool {
        self.cmp_closeness(other) == Ordering::Less
    }
}

/// Sink receiving selection candidates.
pub trait Selector {
    fn add_intersection(&mut self, selectable: &Rc<ObservedSelectable>, intersection: SelectionIntersection);
}

/// Intersection queries against the user's pick volume. All coordinates
/// are world space.
pub trait SelectionTest {
    /// The pick ray.
    fn line(&self) -> Line;

    fn test_point(&self, point: DVec3) -> Option<SelectionIntersection>;

    /// Tests the polyline through `points`.
    fn test_line_strip(&self, points: &[DVec3]) -> Option<SelectionIntersection> {
        points
            .windows(2)
            .filter_map(|segment| self.test_point(self.closest_point_on_segment(segment[0], segment[1])))
            .min_by(SelectionIntersection::cmp_closeness)
            .or_else(|| points.first().and_then(|point| self.test_point(*point)))
    }

    /// Tests a box given in the local space of `local_to_world`.
    fn test_aabb(&self, aabb: &Aabb, local_to_world: &DAffine3) -> Option<SelectionIntersection>;

    /// Point of the segment `a`-`b` closest to the pick ray.
    fn closest_point_on_segment(&self, a: DVec3, b: DVec3) -> DVec3 {
        let line = self.line();
        let direction = line.direction();
        let segment = b - a;
        let offset = a - line.start;
        let along = segment.dot(direction);
        let quadratic = segment.length_squared() - along * along;
        if quadratic <= f64::EPSILON {
            return a;
        }
        let linear = offset.dot(segment) - offset.dot(direction) * along;
        let t = (-linear / quadratic).clamp(0.0, 1.0);
        a + segment * t
    }
}

/// Ray pick with a fixed tolerance radius, the usual click test of an
/// orthographic or perspective view.
#[derive(Debug, Clone, Copy)]
pub struct RaySelectionTest {
    line: Line,
    tolerance: f64,
}

impl RaySelectionTest {
    #[must_use]
    pub fn new(origin: DVec3, direction: DVec3, tolerance: f64) -> Self {
        Self {
            line: Line::new(origin, origin + direction.normalize_or_zero()),
            tolerance,
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl SelectionTest for RaySelectionTest {
    fn line(&self) -> Line {
        self.line
    }

    fn test_point(&self, point: DVec3) -> Option<SelectionIntersection> {
        let direction = self.line.direction();
        let depth = (point - self.line.start).dot(direction);
        if depth < 0.0 {
            return None;
        }
        let distance = point.distance(self.line.start + direction * depth);
        (distance <= self.tolerance).then_some(SelectionIntersection::new(depth, distance))
    }

    fn test_aabb(&self, aabb: &Aabb, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        if !aabb.is_valid() {
            return None;
        }
        let local = self.line.transformed(&local_to_world.inverse());
        let origin = local.start;
        let direction = local.end - local.start;
        let min = aabb.min() - DVec3::splat(self.tolerance);
        let max = aabb.max() + DVec3::splat(self.tolerance);

        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        for axis in 0..3 {
            if direction[axis].abs() < f64::EPSILON {
                if origin[axis] < min[axis] || origin[axis] > max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (min[axis] - origin[axis]) / direction[axis];
            let t2 = (max[axis] - origin[axis]) / direction[axis];
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }
        if t_far < t_near.max(0.0) {
            return None;
        }
        let hit = local.start + direction * t_near.max(0.0);
        let depth = local_to_world.transform_point3(hit).distance(self.line.start);
        Some(SelectionIntersection::new(depth, 0.0))
    }
}

/// Collects candidates and resolves them closest-first.
#[derive(Debug, Default)]
pub struct SelectionPool {
    candidates: Vec<(SelectionIntersection, Rc<ObservedSelectable>)>,
}

impl SelectionPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[must_use]
    pub fn contains(&self, selectable: &Rc<ObservedSelectable>) -> bool {
        self.candidates
            .iter()
            .any(|(_, candidate)| Rc::ptr_eq(candidate, selectable))
    }

    /// The candidate with the closest intersection.
    #[must_use]
    pub fn best(&self) -> Option<&Rc<ObservedSelectable>> {
        self.candidates
            .iter()
            .min_by(|a, b| a.0.cmp_closeness(&b.0))
            .map(|(_, selectable)| selectable)
    }

    /// Candidates ordered closest first.
    #[must_use]
    pub fn sorted(&self) -> Vec<(SelectionIntersection, Rc<ObservedSelectable>)> {
        let mut sorted = self.candidates.clone();
        sorted.sort_by(|a, b| a.0.cmp_closeness(&b.0));
        sorted
    }

    /// Selects the closest candidate; returns whether there was one.
    pub fn select_best(&self) -> bool {
        match self.best() {
            Some(selectable) => {
                selectable.set_selected(true);
                true
            }
            None => false,
        }
    }

    pub fn select_all(&self) {
        for (_, selectable) in &self.candidates {
            selectable.set_selected(true);
        }
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }
}

impl Selector for SelectionPool {
    fn add_intersection(&mut self, selectable: &Rc<ObservedSelectable>, intersection: SelectionIntersection) {
        if let Some(existing) = self
            .candidates
            .iter_mut()
            .find(|(_, candidate)| Rc::ptr_eq(candidate, selectable))
        {
            if intersection.is_closer_than(&existing.0) {
                existing.0 = intersection;
            }
            return;
        }
        self.candidates.push((intersection, selectable.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down_ray_at(x: f64, y: f64) -> RaySelectionTest {
        RaySelectionTest::new(DVec3::new(x, y, 100.0), DVec3::NEG_Z, 1.0)
    }

    #[test]
    fn point_within_tolerance_hits() {
        let test = down_ray_at(0.0, 0.0);
        let hit = test.test_point(DVec3::new(0.5, 0.0, 10.0)).expect("within tolerance");
        assert!((hit.depth - 90.0).abs() < 1e-9);
        assert!((hit.distance - 0.5).abs() < 1e-9);
        assert!(test.test_point(DVec3::new(2.0, 0.0, 10.0)).is_none());
        assert!(test.test_point(DVec3::new(0.0, 0.0, 200.0)).is_none());
    }

    #[test]
    fn line_strip_hits_segment_interior() {
        let test = down_ray_at(5.0, 0.0);
        let points = [DVec3::new(0.0, 0.0, 0.0), DVec3::new(10.0, 0.0, 0.0)];
        let hit = test.test_line_strip(&points).expect("segment crosses the ray");
        assert!(hit.distance < 1e-9);
        assert!((hit.depth - 100.0).abs() < 1e-9);
    }

    #[test]
    fn aabb_slab_test() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(8.0));
        let hit = down_ray_at(0.0, 0.0)
            .test_aabb(&aabb, &DAffine3::IDENTITY)
            .expect("ray through the box");
        assert!((hit.depth - 91.0).abs() < 1e-9);
        assert!(down_ray_at(20.0, 0.0).test_aabb(&aabb, &DAffine3::IDENTITY).is_none());
    }

    #[test]
    fn pool_prefers_closest() {
        let near = ObservedSelectable::detached();
        let far = ObservedSelectable::detached();
        let mut pool = SelectionPool::new();
        pool.add_intersection(&far, SelectionIntersection::new(50.0, 0.0));
        pool.add_intersection(&near, SelectionIntersection::new(10.0, 0.5));
        assert!(Rc::ptr_eq(pool.best().expect("two candidates"), &near));
        assert!(pool.select_best());
        assert!(near.is_selected());
        assert!(!far.is_selected());
    }
}
