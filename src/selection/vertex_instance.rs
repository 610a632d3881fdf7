use std::rc::Rc;

use glam::DVec3;

use super::selectable::{ObservedSelectable, SelectionChangedFn};
use super::selector::{SelectionTest, Selector};

/// A selectable point owned by an entity (origin, light center).
///
/// The coordinate itself stays with the owner; it is handed in whenever the
/// instance is tested or rendered, so the instance can never observe a
/// stale position.
#[derive(Debug, Clone)]
pub struct VertexInstance {
    selectable: Rc<ObservedSelectable>,
}

impl VertexInstance {
    #[must_use]
    pub fn new(on_changed: SelectionChangedFn) -> Self {
        Self {
            selectable: ObservedSelectable::new(on_changed),
        }
    }

    #[inline]
    #[must_use]
    pub fn selectable(&self) -> &Rc<ObservedSelectable> {
        &self.selectable
    }

    #[inline]
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selectable.is_selected()
    }

    #[inline]
    pub fn set_selected(&self, selected: bool) {
        self.selectable.set_selected(selected);
    }

    #[inline]
    pub fn invert_selected(&self) {
        self.selectable.invert_selected();
    }

    /// Reports `vertex` (world space) to `selector` if the pick hits it.
    pub fn test_select(&self, vertex: DVec3, selector: &mut dyn Selector, test: &dyn SelectionTest) {
        if let Some(intersection) = test.test_point(vertex) {
            selector.add_intersection(&self.selectable, intersection);
        }
    }
}

/// A vertex stored as an offset from a base point, e.g. the projection
/// vectors of a light which are relative to the light origin.
#[derive(Debug, Clone)]
pub struct VertexInstanceRelative {
    inner: VertexInstance,
}

impl VertexInstanceRelative {
    #[must_use]
    pub fn new(on_changed: SelectionChangedFn) -> Self {
        Self {
            inner: VertexInstance::new(on_changed),
        }
    }

    #[inline]
    #[must_use]
    pub fn selectable(&self) -> &Rc<ObservedSelectable> {
        self.inner.selectable()
    }

    #[inline]
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.inner.is_selected()
    }

    #[inline]
    pub fn set_selected(&self, selected: bool) {
        self.inner.set_selected(selected);
    }

    #[inline]
    pub fn invert_selected(&self) {
        self.inner.invert_selected();
    }

    /// Tests the point `origin + offset`.
    pub fn test_select(
        &self,
        origin: DVec3,
        offset: DVec3,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
    ) {
        self.inner.test_select(origin + offset, selector, test);
    }
}
