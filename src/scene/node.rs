use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::NodeHandle;
use super::primitive::Primitive;
use crate::curve::CurveNode;
use crate::entity::EntityNode;
use crate::math::Aabb;
use crate::selection::{ComponentEditable, ObservedSelectable, PlaneSelectable};
use crate::transform::{ComponentSnappable, Snappable, Transformable};

/// What a node is.
#[derive(Debug)]
pub enum NodeKind {
    /// The top of a map. Owns worldspawn and every other top level entity.
    Root,
    Entity(EntityNode),
    Primitive(Primitive),
}

/// A node of the map graph.
///
/// # Hierarchy
///
/// Nodes form a tree through parent-child handles:
/// - `parent`: handle of the parent node (`None` for the root and for
///   detached subtrees)
/// - `children`: child handles, in insertion order
///
/// Nodes below the map root are "in the scene": their names live in the
/// map's namespace and their edits are recorded for undo. Detached subtrees
/// (removed nodes kept for undo, pending clones) stay in the arena but are
/// disconnected from both.
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) in_scene: bool,
    kind: NodeKind,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            in_scene: false,
            kind,
        }
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// True while the node is reachable from the map root.
    #[inline]
    #[must_use]
    pub fn is_in_scene(&self) -> bool {
        self.in_scene
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    #[must_use]
    pub fn entity(&self) -> Option<&EntityNode> {
        match &self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn entity_mut(&mut self) -> Option<&mut EntityNode> {
        match &mut self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    #[must_use]
    pub fn primitive(&self) -> Option<&Primitive> {
        match &self.kind {
            NodeKind::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    pub fn primitive_mut(&mut self) -> Option<&mut Primitive> {
        match &mut self.kind {
            NodeKind::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    /// The map root and containers without a model hold children; primitives
    /// and point entities do not.
    #[must_use]
    pub fn can_hold_children(&self) -> bool {
        match &self.kind {
            NodeKind::Root => true,
            NodeKind::Entity(entity) => entity.is_container(),
            NodeKind::Primitive(_) => false,
        }
    }

    #[must_use]
    pub fn local_to_parent(&self) -> DAffine3 {
        match &self.kind {
            NodeKind::Root | NodeKind::Primitive(_) => DAffine3::IDENTITY,
            NodeKind::Entity(entity) => entity.local_to_parent(),
        }
    }

    /// Bounds of the node itself in local space, children excluded.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        match &self.kind {
            NodeKind::Root => Aabb::INVALID,
            NodeKind::Entity(entity) => entity.local_aabb(),
            NodeKind::Primitive(primitive) => primitive.bounds(),
        }
    }

    #[must_use]
    pub fn selectable(&self) -> Option<&Rc<ObservedSelectable>> {
        match &self.kind {
            NodeKind::Root => None,
            NodeKind::Entity(entity) => Some(entity.selectable()),
            NodeKind::Primitive(primitive) => Some(primitive.selectable()),
        }
    }

    /// The position other entities' target lines point at.
    #[must_use]
    pub fn local_target_point(&self) -> DVec3 {
        let aabb = self.local_aabb();
        if aabb.is_valid() { aabb.origin } else { DVec3::ZERO }
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    #[must_use]
    pub fn as_transformable(&self) -> Option<&dyn Transformable> {
        match &self.kind {
            NodeKind::Root => None,
            NodeKind::Entity(entity) => entity.kind().as_transformable(),
            NodeKind::Primitive(primitive) => Some(primitive),
        }
    }

    pub fn as_transformable_mut(&mut self) -> Option<&mut dyn Transformable> {
        match &mut self.kind {
            NodeKind::Root => None,
            NodeKind::Entity(entity) => entity.kind_mut().as_transformable_mut(),
            NodeKind::Primitive(primitive) => Some(primitive),
        }
    }

    pub fn as_snappable_mut(&mut self) -> Option<&mut dyn Snappable> {
        match &mut self.kind {
            NodeKind::Root => None,
            NodeKind::Entity(entity) => entity.kind_mut().as_snappable_mut(),
            NodeKind::Primitive(primitive) => Some(primitive),
        }
    }

    pub fn as_component_snappable_mut(&mut self) -> Option<&mut dyn ComponentSnappable> {
        self.entity_mut()
            .and_then(|entity| entity.kind_mut().as_component_snappable_mut())
    }

    #[must_use]
    pub fn as_component_editable(&self) -> Option<&dyn ComponentEditable> {
        self.entity().and_then(|entity| entity.kind().as_component_editable())
    }

    pub fn as_plane_selectable_mut(&mut self) -> Option<&mut dyn PlaneSelectable> {
        self.entity_mut()
            .and_then(|entity| entity.kind_mut().as_plane_selectable_mut())
    }

    #[must_use]
    pub fn as_curve_node(&self) -> Option<&dyn CurveNode> {
        self.entity().and_then(|entity| entity.kind().as_curve_node())
    }
}
