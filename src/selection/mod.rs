//! Selection
//!
//! Whole-object and component selection. Nodes never decide what ends up
//! selected: they intersect their geometry with a [`SelectionTest`] and hand
//! every hit to a [`Selector`] together with its [`SelectionIntersection`].
//!
//! Component selectables are [`ObservedSelectable`] flags shared by `Rc`:
//! - [`VertexInstance`] / [`VertexInstanceRelative`]: single points
//! - [`CurveEditInstance`](crate::curve::CurveEditInstance): curve control points
//! - [`DragPlanes`]: the six resize faces of a box

pub mod drag_planes;
pub mod selectable;
pub mod selector;
pub mod vertex_instance;

pub use drag_planes::{DragPlanes, FaceMask};
pub use selectable::{ObservedSelectable, SelectionChangedFn};
pub use selector::{RaySelectionTest, SelectionIntersection, SelectionPool, SelectionTest, Selector};
pub use vertex_instance::{VertexInstance, VertexInstanceRelative};

use glam::DAffine3;

use crate::math::{Aabb, Plane3};

/// Which kind of sub-object a component operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentMode {
    Vertex,
    Face,
}

/// Nodes with individually selectable parts.
///
/// `local_to_world` is the full world transform of the node, which the
/// implementation uses to bring its local geometry into test space.
pub trait ComponentEditable {
    fn test_select_components(
        &self,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        mode: ComponentMode,
    );

    fn set_selected_components(&self, selected: bool, mode: ComponentMode);

    fn invert_selected_components(&self, mode: ComponentMode);

    fn is_component_selected(&self) -> bool;

    /// Local bounds of the selected components, invalid if none.
    fn selected_components_bounds(&self) -> Aabb;
}

/// Nodes resizable by dragging the faces of their bounds.
pub trait PlaneSelectable {
    fn select_planes(
        &mut self,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        on_plane: &mut dyn FnMut(&Plane3),
    );

    fn select_reversed_planes(&mut self, selector: &mut dyn Selector, selected_planes: &[Plane3]);
}
