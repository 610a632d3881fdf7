//! Chainable entity operation wrapper.
//!
//! [`SceneEntity`] borrows a [`MapRoot`] mutably and provides a fluent API
//! for editing one entity without threading `?` through every call.
//!
//! All methods silently no-op when the handle is stale or does not refer
//! to an entity. Every edit is its own undo step unless an operation is
//! already open.
//!
//! # Example
//!
//! ```rust,ignore
//! map.scene_entity(light)
//!     .set_origin(DVec3::new(0.0, 0.0, 64.0))
//!     .set_key_value("light_radius", "200 200 200")
//!     .set_name("lamp");
//! ```
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::must_use_candidate)]
use glam::{DQuat, DVec3};

use super::NodeHandle;
use super::map_root::MapRoot;
use crate::entity::OriginKey;
use crate::math::{Aabb, format_vec3};
use crate::transform::TransformDelta;

/// Temporary mutable borrow of an entity node for chainable operations.
pub struct SceneEntity<'a> {
    map: &'a mut MapRoot,
    handle: NodeHandle,
}

impl<'a> SceneEntity<'a> {
    #[inline]
    pub fn new(map: &'a mut MapRoot, handle: NodeHandle) -> Self {
        Self { map, handle }
    }

    /// Returns the underlying handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// True if the handle refers to a live entity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.map.entity(self.handle).is_ok()
    }

    /// The current value of `key`, class default included. Empty for stale
    /// handles.
    #[must_use]
    pub fn key_value(&self, key: &str) -> String {
        self.map
            .spawn_args(self.handle)
            .map(|spawn_args| spawn_args.get_key_value(key))
            .unwrap_or_default()
    }

    // -- Spawnargs (chainable) --

    /// Sets `key`; an empty value erases it.
    #[inline]
    pub fn set_key_value(self, key: &str, value: &str) -> Self {
        if let Err(error) = self.map.set_key_value(self.handle, key, value) {
            log::debug!("SceneEntity: {error}");
        }
        self
    }

    #[inline]
    pub fn erase_key(self, key: &str) -> Self {
        self.set_key_value(key, "")
    }

    /// Renames the entity. A taken name is replaced by a free one.
    #[inline]
    pub fn set_name(self, name: &str) -> Self {
        self.set_key_value("name", name)
    }

    /// Writes `origin` to the `origin` key.
    #[inline]
    pub fn set_origin(self, origin: DVec3) -> Self {
        self.set_key_value(OriginKey::KEY, &format_vec3(origin))
    }

    // -- Manipulation (chainable) --

    /// Moves the entity by `translation` (world space).
    #[inline]
    pub fn translate(self, translation: DVec3) -> Self {
        self.apply(&TransformDelta::translation(translation))
    }

    /// Rotates the entity about its own world bounds centre.
    pub fn rotate(self, rotation: DQuat) -> Self {
        let pivot = self
            .map
            .world_aabb(self.handle)
            .ok()
            .filter(Aabb::is_valid)
            .map_or(DVec3::ZERO, |aabb| aabb.origin);
        self.apply(&TransformDelta::rotation_about(pivot, rotation))
    }

    #[inline]
    pub fn snap_to(self, grid: f64) -> Self {
        if let Err(error) = self.map.snap_to(self.handle, grid) {
            log::debug!("SceneEntity: {error}");
        }
        self
    }

    fn apply(self, delta: &TransformDelta) -> Self {
        if let Err(error) = self.map.apply_transform(self.handle, delta) {
            log::debug!("SceneEntity: {error}");
        }
        self
    }

    // -- Selection and targets (chainable) --

    #[inline]
    pub fn set_selected(self, selected: bool) -> Self {
        if let Err(error) = self.map.set_selected(self.handle, selected) {
            log::debug!("SceneEntity: {error}");
        }
        self
    }

    /// Adds a `targetN` key pointing at `target`.
    #[inline]
    pub fn connect_to(self, target: NodeHandle) -> Self {
        if let Err(error) = self.map.connect_entities(self.handle, target) {
            log::debug!("SceneEntity: {error}");
        }
        self
    }
}
