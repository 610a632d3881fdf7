use std::cell::RefCell;
use std::rc::Rc;

use glam::{DAffine3, DMat3, DVec3};

use super::angle_key::AngleKey;
use super::key_observer::{KeyObserverMap, KeySubscription};
use super::node::{EntityGeometry, observe_state};
use super::origin_key::OriginKey;
use super::rotation_key::{RotationKey, RotationMatrix};
use super::spawn_args::SpawnArgs;
use crate::math::{Aabb, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry};
use crate::transform::{Snappable, TransformContext, TransformDelta, Transformable};

const ARROW_LENGTH: f64 = 32.0;

#[derive(Debug, Default)]
struct GenericState {
    origin_key: OriginKey,
    origin: DVec3,
    angle_key: AngleKey,
    angle: f64,
    rotation_key: RotationKey,
    rotation: RotationMatrix,
}

/// Fixed-size point entity without a model: a box with a direction arrow.
///
/// Classes that set `editor_rotatable` to `1` rotate freely and persist
/// the full `rotation` matrix; all others only turn about Z via `angle`.
#[derive(Debug)]
pub struct Generic {
    spawn_args: Rc<SpawnArgs>,
    state: Rc<RefCell<GenericState>>,
    rotatable: bool,
    bounds: Aabb,
    _subscriptions: Vec<KeySubscription>,
}

impl Generic {
    #[must_use]
    pub fn new(spawn_args: &Rc<SpawnArgs>, observers: &KeyObserverMap) -> Self {
        let rotatable = spawn_args.get_key_value("editor_rotatable") == "1";
        let bounds = spawn_args
            .entity_class()
            .bounds()
            .unwrap_or(Aabb::new(DVec3::ZERO, DVec3::splat(8.0)));
        let state = Rc::new(RefCell::new(GenericState::default()));

        let mut subscriptions = vec![observe_state(observers, OriginKey::KEY, &state, |state, value| {
            state.origin_key.on_key_value_changed(value);
            state.origin = state.origin_key.get();
        })];
        if rotatable {
            subscriptions.push(observe_state(observers, AngleKey::KEY, &state, |state, value| {
                state.rotation_key.on_angle_changed(value);
                state.rotation = state.rotation_key.get();
            }));
            subscriptions.push(observe_state(observers, RotationKey::KEY, &state, |state, value| {
                state.rotation_key.on_rotation_changed(value);
                state.rotation = state.rotation_key.get();
            }));
        } else {
            subscriptions.push(observe_state(observers, AngleKey::KEY, &state, |state, value| {
                state.angle_key.on_key_value_changed(value);
                state.angle = state.angle_key.get();
            }));
        }

        Self {
            spawn_args: spawn_args.clone(),
            state,
            rotatable,
            bounds,
            _subscriptions: subscriptions,
        }
    }

    #[must_use]
    pub fn is_rotatable(&self) -> bool {
        self.rotatable
    }

    /// Working origin.
    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.state.borrow().origin
    }

    /// Working heading in degrees (angle mode only).
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.state.borrow().angle
    }

    /// Working orientation.
    #[must_use]
    pub fn rotation(&self) -> RotationMatrix {
        let state = self.state.borrow();
        if self.rotatable {
            state.rotation
        } else {
            RotationMatrix::from_angle(state.angle)
        }
    }

    /// The way the entity faces: local Z for free rotation, X turned by
    /// the heading otherwise.
    #[must_use]
    pub fn direction(&self) -> DVec3 {
        let state = self.state.borrow();
        if self.rotatable {
            state.rotation.matrix() * DVec3::Z
        } else {
            DMat3::from_rotation_z(state.angle.to_radians()) * DVec3::X
        }
    }
}

impl Transformable for Generic {
    fn revert_transform(&mut self) {
        let mut state = self.state.borrow_mut();
        state.origin = state.origin_key.get();
        state.angle = state.angle_key.get();
        state.rotation = state.rotation_key.get();
    }

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        if delta.is_component() {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.origin = context.transform_point(delta, state.origin);
        if self.rotatable {
            state.rotation.rotate(delta.rotation);
        } else {
            state.angle = AngleKey::rotated_value(state.angle, delta.rotation);
        }
    }

    fn freeze_transform(&mut self) {
        let (origin, angle, rotation) = {
            let state = self.state.borrow();
            (state.origin, state.angle, state.rotation)
        };
        OriginKey::new(origin).write(&self.spawn_args);
        if self.rotatable {
            rotation.write_to(&self.spawn_args, RotationKey::KEY);
        } else {
            AngleKey::new(angle).write(&self.spawn_args);
        }
        self.revert_transform();
    }
}

impl Snappable for Generic {
    fn snap_to(&mut self, grid: f64) {
        let origin = snap_vec3(self.state.borrow().origin_key.get(), grid);
        OriginKey::new(origin).write(&self.spawn_args);
    }
}

impl EntityGeometry for Generic {
    fn local_to_parent(&self) -> DAffine3 {
        DAffine3::from_translation(self.state.borrow().origin)
    }

    fn local_aabb(&self) -> Aabb {
        self.bounds
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        let shader = ShaderHandle::colour(colour);
        collector.add_geometry(&shader, geometry::aabb_wireframe(&self.bounds, local_to_world, colour));
        let start = local_to_world.transform_point3(self.bounds.origin);
        let direction = local_to_world.transform_vector3(self.direction());
        collector.add_geometry(&shader, geometry::arrow(start, direction, ARROW_LENGTH, colour));
    }

    fn render_solid(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        let shader = ShaderHandle::colour(colour);
        collector.add_geometry(&shader, geometry::aabb_solid(&self.bounds, local_to_world, colour));
        let start = local_to_world.transform_point3(self.bounds.origin);
        let direction = local_to_world.transform_vector3(self.direction());
        collector.add_geometry(&shader, geometry::arrow(start, direction, ARROW_LENGTH, colour));
    }
}
