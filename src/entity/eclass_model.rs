use std::cell::RefCell;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::key_observer::{KeyObserverMap, KeySubscription};
use super::node::{EntityGeometry, observe_state};
use super::origin_key::OriginKey;
use super::rotation_key::{RotationKey, RotationMatrix};
use super::spawn_args::SpawnArgs;
use crate::math::{Aabb, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry};
use crate::transform::{Snappable, TransformContext, TransformDelta, Transformable};

#[derive(Debug, Default)]
struct EclassModelState {
    origin_key: OriginKey,
    origin: DVec3,
    rotation_key: RotationKey,
    rotation: RotationMatrix,
    model: String,
}

/// Fixed-size entity whose class names a model.
#[derive(Debug)]
pub struct EclassModel {
    spawn_args: Rc<SpawnArgs>,
    state: Rc<RefCell<EclassModelState>>,
    bounds: Aabb,
    _subscriptions: Vec<KeySubscription>,
}

impl EclassModel {
    #[must_use]
    pub fn new(spawn_args: &Rc<SpawnArgs>, observers: &KeyObserverMap) -> Self {
        let bounds = spawn_args
            .entity_class()
            .bounds()
            .unwrap_or(Aabb::new(DVec3::ZERO, DVec3::splat(8.0)));
        let state = Rc::new(RefCell::new(EclassModelState::default()));

        let subscriptions = vec![
            observe_state(observers, OriginKey::KEY, &state, |state, value| {
                state.origin_key.on_key_value_changed(value);
                state.origin = state.origin_key.get();
            }),
            observe_state(observers, "angle", &state, |state, value| {
                state.rotation_key.on_angle_changed(value);
                state.rotation = state.rotation_key.get();
            }),
            observe_state(observers, RotationKey::KEY, &state, |state, value| {
                state.rotation_key.on_rotation_changed(value);
                state.rotation = state.rotation_key.get();
            }),
            observe_state(observers, "model", &state, |state, value| {
                value.clone_into(&mut state.model);
            }),
        ];

        Self {
            spawn_args: spawn_args.clone(),
            state,
            bounds,
            _subscriptions: subscriptions,
        }
    }

    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.state.borrow().origin
    }

    #[must_use]
    pub fn rotation(&self) -> RotationMatrix {
        self.state.borrow().rotation
    }

    #[must_use]
    pub fn model(&self) -> String {
        self.state.borrow().model.clone()
    }
}

impl Transformable for EclassModel {
    fn revert_transform(&mut self) {
        let mut state = self.state.borrow_mut();
        state.origin = state.origin_key.get();
        state.rotation = state.rotation_key.get();
    }

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        if delta.is_component() {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.origin = context.transform_point(delta, state.origin);
        state.rotation.rotate(delta.rotation);
    }

    fn freeze_transform(&mut self) {
        let (origin, rotation) = {
            let state = self.state.borrow();
            (state.origin, state.rotation)
        };
        OriginKey::new(origin).write(&self.spawn_args);
        RotationKey::write(&rotation, &self.spawn_args, true);
        self.revert_transform();
    }
}

impl Snappable for EclassModel {
    fn snap_to(&mut self, grid: f64) {
        let origin = snap_vec3(self.state.borrow().origin_key.get(), grid);
        OriginKey::new(origin).write(&self.spawn_args);
    }
}

impl EntityGeometry for EclassModel {
    fn local_to_parent(&self) -> DAffine3 {
        let state = self.state.borrow();
        DAffine3::from_translation(state.origin) * DAffine3::from_mat3(state.rotation.matrix())
    }

    fn local_aabb(&self) -> Aabb {
        self.bounds
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        collector.add_geometry(
            &ShaderHandle::colour(colour),
            geometry::aabb_wireframe(&self.bounds, local_to_world, colour),
        );
    }
}
