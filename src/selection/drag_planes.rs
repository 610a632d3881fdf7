//! Drag-resize handles around a bounding box.
//!
//! Six selectable faces, one per axis direction. Picking works by checking
//! whether the pick ray lies in front of all four corners of a face; the
//! faces that pass get selected together, so a click beside a corner grabs
//! two or three faces at once. Dragging then moves the selected faces and
//! leaves the others in place.

use std::rc::Rc;

use bitflags::bitflags;
use glam::{DAffine3, DMat3, DVec3};

use super::selectable::{ObservedSelectable, SelectionChangedFn};
use super::selector::{SelectionIntersection, SelectionTest, Selector};
use crate::math::{Aabb, Plane3};

bitflags! {
    /// The six faces of a [`DragPlanes`] set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaceMask: u8 {
        const RIGHT = 1 << 0;
        const LEFT = 1 << 1;
        const FRONT = 1 << 2;
        const BACK = 1 << 3;
        const TOP = 1 << 4;
        const BOTTOM = 1 << 5;
    }
}

/// Faces in [`Aabb::planes`] order with the indices of the corners that
/// span them.
const FACES: [(FaceMask, [usize; 4]); 6] = [
    (FaceMask::RIGHT, [1, 2, 5, 6]),
    (FaceMask::LEFT, [0, 3, 4, 7]),
    (FaceMask::FRONT, [0, 1, 4, 5]),
    (FaceMask::BACK, [2, 3, 6, 7]),
    (FaceMask::TOP, [0, 1, 2, 3]),
    (FaceMask::BOTTOM, [4, 5, 6, 7]),
];

#[derive(Debug, Clone)]
pub struct DragPlanes {
    faces: [Rc<ObservedSelectable>; 6],
    /// Box captured by the last [`DragPlanes::select_planes`], local space.
    pub bounds: Aabb,
}

impl DragPlanes {
    #[must_use]
    pub fn new(on_changed: &SelectionChangedFn) -> Self {
        Self {
            faces: std::array::from_fn(|_| ObservedSelectable::new(on_changed.clone())),
            bounds: Aabb::INVALID,
        }
    }

    /// True if any face is selected.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.faces.iter().any(|face| face.is_selected())
    }

    pub fn set_selected(&self, selected: bool) {
        for face in &self.faces {
            face.set_selected(selected);
        }
    }

    #[must_use]
    pub fn selected_faces(&self) -> FaceMask {
        FACES
            .iter()
            .zip(&self.faces)
            .filter(|(_, face)| face.is_selected())
            .fold(FaceMask::empty(), |mask, ((flag, _), _)| mask | *flag)
    }

    pub fn set_selected_faces(&self, mask: FaceMask) {
        for ((flag, _), face) in FACES.iter().zip(&self.faces) {
            face.set_selected(mask.contains(*flag));
        }
    }

    #[must_use]
    pub fn face(&self, face: FaceMask) -> Option<&Rc<ObservedSelectable>> {
        FACES
            .iter()
            .position(|(flag, _)| *flag == face)
            .map(|index| &self.faces[index])
    }

    /// Offers every face that faces the pick ray to `selector`.
    ///
    /// `aabb` is given in local space; `local_to_world` maps it into the
    /// space of `test`. `on_plane` receives the local plane of each face
    /// that passed. The faces are tested independently, so two opposite
    /// faces can both pass for a ray running inside the box.
    pub fn select_planes(
        &mut self,
        aabb: &Aabb,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        mut on_plane: impl FnMut(&Plane3),
    ) {
        let line = test.line().transformed(&local_to_world.inverse());
        let offsets = aabb.corners().map(|corner| line.closest_point(corner) - corner);
        let planes = aabb.planes();

        for (((_, corners), plane), face) in FACES.iter().zip(&planes).zip(&self.faces) {
            if corners.iter().all(|&index| plane.normal.dot(offsets[index]) > 0.0) {
                selector.add_intersection(face, SelectionIntersection::default());
                on_plane(plane);
            }
        }

        self.bounds = *aabb;
    }

    /// Offers the faces whose plane is the mirror image of one of
    /// `selected_planes`, i.e. faces touching an already selected face of a
    /// neighbouring object.
    pub fn select_reversed_planes(&self, aabb: &Aabb, selector: &mut dyn Selector, selected_planes: &[Plane3]) {
        for (plane, face) in aabb.planes().iter().zip(&self.faces) {
            let reversed = plane.reversed();
            if selected_planes
                .iter()
                .any(|selected| selected.abs_diff_eq(&reversed, 1e-6))
            {
                selector.add_intersection(face, SelectionIntersection::default());
            }
        }
    }

    /// The box resulting from moving the selected faces of `bounds` by
    /// `translation` (local space). Flat axes keep their extent.
    #[must_use]
    pub fn evaluate_resize(&self, translation: DVec3) -> Aabb {
        let mut min = self.bounds.min();
        let mut max = self.bounds.max();
        let selected = self.selected_faces();
        let axes = [
            (FaceMask::RIGHT, FaceMask::LEFT),
            (FaceMask::FRONT, FaceMask::BACK),
            (FaceMask::TOP, FaceMask::BOTTOM),
        ];

        for (axis, (high, low)) in axes.into_iter().enumerate() {
            if self.bounds.extents[axis] == 0.0 {
                continue;
            }
            if selected.contains(high) {
                max[axis] += translation[axis];
            }
            if selected.contains(low) {
                min[axis] += translation[axis];
            }
        }

        Aabb::from_min_max(min, max)
    }

    /// Resize for a box that is rotated by `rotation` in world space.
    /// `translation` is in world space, the result in local space with its
    /// origin shift mapped back through the rotation.
    #[must_use]
    pub fn evaluate_resize_rotated(&self, translation: DVec3, rotation: &DMat3) -> Aabb {
        let mut aabb = self.evaluate_resize(rotation.transpose() * translation);
        aabb.origin = self.bounds.origin + *rotation * (aabb.origin - self.bounds.origin);
        aabb
    }

    /// Scale and translation mapping `bounds` onto the resized box.
    #[must_use]
    pub fn evaluate_transform(&self, translation: DVec3) -> DAffine3 {
        let aabb = self.evaluate_resize(translation);
        let old = self.bounds.extents;
        let scale = DVec3::new(
            if old.x == 0.0 { 1.0 } else { aabb.extents.x / old.x },
            if old.y == 0.0 { 1.0 } else { aabb.extents.y / old.y },
            if old.z == 0.0 { 1.0 } else { aabb.extents.z / old.z },
        );
        let pivot = self.bounds.origin;

        DAffine3::from_translation(aabb.origin - pivot)
            * DAffine3::from_translation(pivot)
            * DAffine3::from_scale(scale)
            * DAffine3::from_translation(-pivot)
    }
}
