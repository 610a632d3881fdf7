use std::fmt;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use crate::math::{Aabb, snap_vec3};
use crate::selection::{ObservedSelectable, SelectionChangedFn, SelectionTest, Selector};

/// One selectable per control point of a curve.
///
/// The instance never owns points; every operation receives the committed
/// and the working list of its curve, which always have the same length as
/// the selectable list.
pub struct CurveEditInstance {
    selectables: Vec<Rc<ObservedSelectable>>,
    on_changed: SelectionChangedFn,
}

impl CurveEditInstance {
    #[must_use]
    pub fn new(on_changed: SelectionChangedFn) -> Self {
        Self {
            selectables: Vec::new(),
            on_changed,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectables.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectables.is_empty()
    }

    #[must_use]
    pub fn selectables(&self) -> &[Rc<ObservedSelectable>] {
        &self.selectables
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selectables.iter().any(|selectable| selectable.is_selected())
    }

    pub fn set_selected(&self, selected: bool) {
        for selectable in &self.selectables {
            selectable.set_selected(selected);
        }
    }

    pub fn invert_selected(&self) {
        for selectable in &self.selectables {
            selectable.invert_selected();
        }
    }

    /// Indices of the selected control points, ascending.
    #[must_use]
    pub fn selected_indices(&self) -> Vec<usize> {
        self.selectables
            .iter()
            .enumerate()
            .filter_map(|(index, selectable)| selectable.is_selected().then_some(index))
            .collect()
    }

    /// Matches the selectable count to `len`. Surviving points keep their
    /// selection, new ones start unselected.
    pub(crate) fn resize(&mut self, len: usize) {
        let on_changed = &self.on_changed;
        self.selectables
            .resize_with(len, || ObservedSelectable::new(on_changed.clone()));
    }

    /// Drops the selectables at `indices` (ascending).
    pub(crate) fn remove(&mut self, indices: &[usize]) {
        for &index in indices.iter().rev() {
            if index < self.selectables.len() {
                self.selectables.remove(index);
            }
        }
    }

    /// Adds an unselected selectable in front of every index in `indices`
    /// (ascending, relative to the list before insertion).
    pub(crate) fn insert_before(&mut self, indices: &[usize]) {
        for &index in indices.iter().rev() {
            let selectable = ObservedSelectable::new(self.on_changed.clone());
            self.selectables.insert(index.min(self.selectables.len()), selectable);
        }
    }

    pub fn test_select(
        &self,
        transformed: &[DVec3],
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
    ) {
        debug_assert_eq!(transformed.len(), self.selectables.len(), "curve instance mismatch");
        for (point, selectable) in transformed.iter().zip(&self.selectables) {
            if let Some(intersection) = test.test_point(local_to_world.transform_point3(*point)) {
                selector.add_intersection(selectable, intersection);
            }
        }
    }

    /// Sets the working points to `matrix` applied to the committed ones,
    /// either for all points or just the selected ones.
    pub fn transform(&self, committed: &[DVec3], transformed: &mut [DVec3], matrix: &DAffine3, selected_only: bool) {
        for ((working, original), selectable) in transformed.iter_mut().zip(committed).zip(&self.selectables) {
            if !selected_only || selectable.is_selected() {
                *working = matrix.transform_point3(*original);
            }
        }
    }

    pub fn snap_to(&self, transformed: &mut [DVec3], grid: f64) {
        for (working, selectable) in transformed.iter_mut().zip(&self.selectables) {
            if selectable.is_selected() {
                *working = snap_vec3(*working, grid);
            }
        }
    }

    #[must_use]
    pub fn selected_bounds(&self, transformed: &[DVec3]) -> Aabb {
        Aabb::from_points(
            transformed
                .iter()
                .zip(&self.selectables)
                .filter(|(_, selectable)| selectable.is_selected())
                .map(|(point, _)| *point),
        )
    }

    /// Working positions of the selected points.
    pub fn selected_points<'a>(&'a self, transformed: &'a [DVec3]) -> impl Iterator<Item = DVec3> + 'a {
        transformed
            .iter()
            .zip(&self.selectables)
            .filter(|(_, selectable)| selectable.is_selected())
            .map(|(point, _)| *point)
    }
}

impl fmt::Debug for CurveEditInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveEditInstance")
            .field("selectables", &self.selectables)
            .finish_non_exhaustive()
    }
}
