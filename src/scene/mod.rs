//! Scene Graph
//!
//! The map is a tree of [`Node`]s stored in a slotmap arena owned by the
//! [`MapRoot`]. Parent and child edges are [`NodeHandle`]s; relations that
//! are not ownership (targets, namespace membership) are resolved through
//! the map root by name or handle, never held as pointers.
//!
//! - [`Node`]: hierarchy plus a [`NodeKind`] (root, entity or primitive)
//! - [`MapRoot`]: arena, namespace, targets, undo and settings of one map
//! - [`SceneEntity`]: chainable editing of one entity
//! - [`Primitive`]: the point set standing in for brushes and patches

pub mod map_root;
pub mod node;
pub mod primitive;
pub mod wrapper;

pub use map_root::MapRoot;
pub use node::{Node, NodeKind};
pub use primitive::Primitive;
pub use wrapper::SceneEntity;

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a node in a [`MapRoot`] arena.
    pub struct NodeHandle;
}
