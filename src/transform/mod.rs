//! Transform protocol
//!
//! Every manipulation of a node runs through the same three steps:
//!
//! 1. [`Transformable::revert_transform`]: the working state is reset to the
//!    committed state (the spawnargs).
//! 2. [`Transformable::evaluate_transform`]: the pending [`TransformDelta`]
//!    is applied on top of the committed state. This runs once per input
//!    event while the user drags and never touches the committed state.
//! 3. [`Transformable::freeze_transform`]: the working state becomes the
//!    committed state and is written back to the spawnargs, which records
//!    the change for undo.
//!
//! A manipulation that is cancelled ends with a revert instead of a freeze,
//! so nothing reaches the spawnargs.
//!
//! Containers (brush entities without a model) do not move themselves.
//! They report [`Transformable::forwards_to_children`] and the map root hands
//! the same delta to each child.

use glam::{DAffine3, DMat3, DQuat, DVec3};

use crate::selection::ComponentMode;
use crate::settings::EntitySettings;

/// What a delta moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransformKind {
    /// Whole objects.
    #[default]
    Primitive,
    /// The selected components (vertices, faces) of an object.
    Component(ComponentMode),
}

/// The pending change of a manipulation, in world space.
///
/// Applied as scale first, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformDelta {
    pub kind: TransformKind,
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for TransformDelta {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformDelta {
    pub const IDENTITY: Self = Self {
        kind: TransformKind::Primitive,
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    #[must_use]
    pub fn translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// A rotation about the world origin.
    #[must_use]
    pub fn rotation(rotation: DQuat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn scale(scale: DVec3) -> Self {
        Self {
            scale,
            ..Self::IDENTITY
        }
    }

    /// A rotation about `pivot`, expressed as a rotation about the origin
    /// plus the translation that keeps `pivot` in place.
    #[must_use]
    pub fn rotation_about(pivot: DVec3, rotation: DQuat) -> Self {
        Self {
            rotation,
            translation: pivot - rotation * pivot,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: TransformKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_component(&self) -> bool {
        matches!(self.kind, TransformKind::Component(_))
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.translation == DVec3::ZERO && self.rotation == DQuat::IDENTITY && self.scale == DVec3::ONE
    }

    /// `T * R * S`.
    #[must_use]
    pub fn matrix(&self) -> DAffine3 {
        DAffine3::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// The rotation part as a matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }
}

/// Environment of a transform evaluation.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub settings: &'a EntitySettings,
    /// World transform of the parent of the node being evaluated.
    pub parent_to_world: DAffine3,
}

impl<'a> TransformContext<'a> {
    #[must_use]
    pub fn new(settings: &'a EntitySettings, parent_to_world: DAffine3) -> Self {
        Self {
            settings,
            parent_to_world,
        }
    }

    /// `translation` (world space) expressed in the parent space.
    #[must_use]
    pub fn parent_translation(&self, translation: DVec3) -> DVec3 {
        self.parent_to_world.inverse().transform_vector3(translation)
    }

    /// The matrix of `delta` expressed in the parent space.
    #[must_use]
    pub fn local_matrix(&self, delta: &TransformDelta) -> DAffine3 {
        self.parent_to_world.inverse() * delta.matrix() * self.parent_to_world
    }

    /// Where `point` (parent space) ends up under `delta`.
    #[must_use]
    pub fn transform_point(&self, delta: &TransformDelta, point: DVec3) -> DVec3 {
        self.local_matrix(delta).transform_point3(point)
    }
}

/// The revert / evaluate / freeze protocol.
///
/// `revert_transform` may be called any number of times.
/// `evaluate_transform` always starts from the committed state, callers
/// revert before every evaluation.
pub trait Transformable {
    fn revert_transform(&mut self);

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>);

    fn freeze_transform(&mut self);

    /// True if the delta must also be applied to the child nodes.
    fn forwards_to_children(&self) -> bool {
        false
    }
}

/// Objects that can round their position to a grid.
pub trait Snappable {
    fn snap_to(&mut self, grid: f64);
}

/// Objects that can round their selected components to a grid.
pub trait ComponentSnappable {
    fn snap_components(&mut self, grid: f64);
}

/// Objects that can be moved without going through the manipulation
/// protocol, e.g. when a container origin is pushed down to its children.
pub trait Translatable {
    fn translate(&mut self, translation: DVec3);
}
