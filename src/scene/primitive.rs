//! Brush and patch stand-in.
//!
//! Map primitives are out of scope beyond what the entity core needs from
//! them: they move with their container, they snap, they have bounds and
//! they restore their points on undo. A [`Primitive`] is a plain point set
//! offering exactly that.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use glam::{DAffine3, DVec3};

use crate::math::{Aabb, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry};
use crate::selection::{ObservedSelectable, SelectionIntersection, SelectionTest};
use crate::transform::{Snappable, TransformContext, TransformDelta, Transformable, Translatable};
use crate::undo::{UndoMemento, UndoRecorder, UndoTarget, Undoable};

const PRIMITIVE_COLOUR: DVec3 = DVec3::ONE;

struct PrimitivePoints {
    self_ref: Weak<PrimitivePoints>,
    committed: RefCell<Vec<DVec3>>,
    transformed: RefCell<Vec<DVec3>>,
    undo: RefCell<Weak<UndoRecorder>>,
}

impl PrimitivePoints {
    fn save_undo(&self) {
        let recorder = self.undo.borrow().upgrade();
        if let Some(recorder) = recorder {
            let target: Weak<dyn Undoable> = self.self_ref.clone();
            recorder.save(UndoTarget::Object(target), || self.export_state());
        }
    }

    fn commit(&self, points: Vec<DVec3>) {
        self.save_undo();
        self.transformed.borrow_mut().clone_from(&points);
        *self.committed.borrow_mut() = points;
    }
}

impl Undoable for PrimitivePoints {
    fn export_state(&self) -> UndoMemento {
        UndoMemento::Points(self.committed.borrow().clone())
    }

    fn import_state(&self, memento: &UndoMemento) {
        let UndoMemento::Points(points) = memento else {
            log::error!("Primitive: cannot import a non point snapshot");
            return;
        };
        self.save_undo();
        self.transformed.borrow_mut().clone_from(points);
        self.committed.borrow_mut().clone_from(points);
    }
}

/// A transformable point set with bounds.
pub struct Primitive {
    points: Rc<PrimitivePoints>,
    selectable: Rc<ObservedSelectable>,
}

impl Primitive {
    #[must_use]
    pub fn new(points: Vec<DVec3>) -> Self {
        let points = Rc::new_cyclic(|self_ref| PrimitivePoints {
            self_ref: self_ref.clone(),
            committed: RefCell::new(points.clone()),
            transformed: RefCell::new(points),
            undo: RefCell::new(Weak::new()),
        });
        Self {
            points,
            selectable: ObservedSelectable::detached(),
        }
    }

    /// The eight corners of `aabb`.
    #[must_use]
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self::new(aabb.corners().to_vec())
    }

    /// Committed points.
    #[must_use]
    pub fn points(&self) -> Vec<DVec3> {
        self.points.committed.borrow().clone()
    }

    /// Points including the pending manipulation.
    #[must_use]
    pub fn transformed_points(&self) -> Vec<DVec3> {
        self.points.transformed.borrow().clone()
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.points.transformed.borrow().iter().copied())
    }

    #[inline]
    #[must_use]
    pub fn selectable(&self) -> &Rc<ObservedSelectable> {
        &self.selectable
    }

    #[must_use]
    pub fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        test.test_aabb(&self.bounds(), local_to_world)
    }

    pub fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3) {
        let bounds = self.bounds();
        if bounds.is_valid() {
            collector.add_geometry(
                &ShaderHandle::colour(PRIMITIVE_COLOUR),
                geometry::aabb_wireframe(&bounds, local_to_world, PRIMITIVE_COLOUR),
            );
        }
    }

    pub fn render_solid(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3) {
        let bounds = self.bounds();
        if bounds.is_valid() {
            collector.add_geometry(
                &ShaderHandle::colour(PRIMITIVE_COLOUR),
                geometry::aabb_solid(&bounds, local_to_world, PRIMITIVE_COLOUR),
            );
        }
    }

    pub(crate) fn clone_primitive(&self) -> Self {
        Self::new(self.points())
    }

    pub(crate) fn connect_undo(&self, recorder: &Rc<UndoRecorder>) {
        *self.points.undo.borrow_mut() = Rc::downgrade(recorder);
    }

    pub(crate) fn disconnect_undo(&self) {
        *self.points.undo.borrow_mut() = Weak::new();
    }
}

impl Transformable for Primitive {
    fn revert_transform(&mut self) {
        let committed = self.points.committed.borrow();
        self.points.transformed.borrow_mut().clone_from(&committed);
    }

    /// Component edits of primitives are not modelled; only whole-object
    /// deltas move the points.
    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        if delta.is_component() {
            return;
        }
        let matrix = context.local_matrix(delta);
        let transformed: Vec<DVec3> = self
            .points
            .committed
            .borrow()
            .iter()
            .map(|&point| matrix.transform_point3(point))
            .collect();
        *self.points.transformed.borrow_mut() = transformed;
    }

    fn freeze_transform(&mut self) {
        let transformed = self.transformed_points();
        if transformed != *self.points.committed.borrow() {
            self.points.commit(transformed);
        }
    }
}

impl Snappable for Primitive {
    fn snap_to(&mut self, grid: f64) {
        let snapped: Vec<DVec3> = self.points().into_iter().map(|point| snap_vec3(point, grid)).collect();
        self.points.commit(snapped);
    }
}

impl Translatable for Primitive {
    fn translate(&mut self, translation: DVec3) {
        let moved: Vec<DVec3> = self.points().into_iter().map(|point| point + translation).collect();
        self.points.commit(moved);
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("points", &self.points.committed.borrow().len())
            .field("bounds", &self.bounds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EntitySettings;

    #[test]
    fn evaluate_works_in_parent_space() {
        let settings = EntitySettings::default();
        let mut primitive = Primitive::new(vec![DVec3::ZERO, DVec3::X]);
        let context = TransformContext::new(&settings, DAffine3::from_translation(DVec3::new(0.0, 0.0, 100.0)));

        primitive.evaluate_transform(&TransformDelta::translation(DVec3::new(5.0, 0.0, 0.0)), &context);
        assert_eq!(primitive.transformed_points(), vec![DVec3::new(5.0, 0.0, 0.0), DVec3::new(6.0, 0.0, 0.0)]);
        assert_eq!(primitive.points(), vec![DVec3::ZERO, DVec3::X]);

        primitive.revert_transform();
        assert_eq!(primitive.transformed_points(), primitive.points());
    }

    #[test]
    fn freeze_commits_and_undo_restores() {
        let settings = EntitySettings::default();
        let mut system = crate::undo::UndoSystem::default();
        let mut primitive = Primitive::new(vec![DVec3::ZERO]);
        primitive.connect_undo(system.recorder());

        system.start();
        primitive.evaluate_transform(
            &TransformDelta::translation(DVec3::splat(2.0)),
            &TransformContext::new(&settings, DAffine3::IDENTITY),
        );
        primitive.freeze_transform();
        system.finish("move");

        assert_eq!(primitive.points(), vec![DVec3::splat(2.0)]);
        let operation = system.pop_undo().expect("move recorded");
        assert_eq!(operation.snapshots[0].memento, UndoMemento::Points(vec![DVec3::ZERO]));
    }
}
