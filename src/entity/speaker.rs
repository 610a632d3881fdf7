//! Speakers
//!
//! A speaker plays a sound shader (`s_shader`) with a falloff between
//! `s_mindistance` and `s_maxdistance`, both stored in metres. Unset
//! distances fall back to the shader's defaults. The bounds of a speaker
//! are its max radius, so drag-resizing a face changes the max radius and
//! scales the min radius along with it.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::key_observer::{KeyObserverMap, KeySubscription};
use super::node::{EntityGeometry, observe_state};
use super::origin_key::OriginKey;
use super::spawn_args::SpawnArgs;
use crate::math::{Aabb, Plane3, format_float, parse_float, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry, shaders};
use crate::selection::{
    ComponentEditable, ComponentMode, DragPlanes, PlaneSelectable, SelectionChangedFn, SelectionIntersection,
    SelectionTest, Selector,
};
use crate::sound::{METRES_TO_UNITS, SoundManager, SoundRadii};
use crate::transform::{Snappable, TransformContext, TransformDelta, Transformable};

pub const SHADER_KEY: &str = "s_shader";
pub const MIN_DISTANCE_KEY: &str = "s_mindistance";
pub const MAX_DISTANCE_KEY: &str = "s_maxdistance";

const MIN_RADIUS_FLOOR: f64 = 0.01;
const MAX_RADIUS_FLOOR: f64 = 0.02;

#[derive(Debug, Default)]
struct SpeakerState {
    origin_key: OriginKey,
    origin: DVec3,
    default_radii: SoundRadii,
    radii: SoundRadii,
    radii_transformed: SoundRadii,
    min_is_set: bool,
    max_is_set: bool,
}

impl SpeakerState {
    fn shader_changed(&mut self, defaults: SoundRadii) {
        self.default_radii = defaults;
        if !self.min_is_set {
            self.radii.min = defaults.min;
        }
        if !self.max_is_set {
            self.radii.max = defaults.max;
        }
        self.radii_transformed = self.radii;
    }

    fn min_changed(&mut self, value: &str) {
        self.min_is_set = !value.is_empty();
        self.radii.min = if self.min_is_set {
            parse_float(value).unwrap_or(0.0) * METRES_TO_UNITS
        } else {
            self.default_radii.min
        };
        self.radii_transformed.min = self.radii.min;
    }

    fn max_changed(&mut self, value: &str) {
        self.max_is_set = !value.is_empty();
        self.radii.max = if self.max_is_set {
            parse_float(value).unwrap_or(0.0) * METRES_TO_UNITS
        } else {
            self.default_radii.max
        };
        self.radii_transformed.max = self.radii.max;
    }

    /// Bounds around the origin, sized by the working max radius.
    fn border(&self, class_bounds: &Aabb) -> Aabb {
        Aabb::new(class_bounds.origin, DVec3::splat(self.radii_transformed.max))
    }

    fn set_radius_from_aabb(&mut self, aabb: &Aabb, current: &Aabb, symmetric: bool) {
        let delta = aabb.extents - current.extents;
        let mut max_translation = if delta.x.abs() > delta.y.abs() {
            if delta.x.abs() > delta.z.abs() { delta.x } else { delta.z }
        } else if delta.y.abs() > delta.z.abs() {
            delta.y
        } else {
            delta.z
        };

        if symmetric {
            max_translation *= 2.0;
        } else {
            self.origin += aabb.origin - current.origin;
        }

        let mut old_radius = if self.radii.max > 0.0 { self.radii.max } else { self.radii.min };
        if old_radius == 0.0 {
            old_radius = 1.0;
        }

        let mut new_max = old_radius + max_translation;
        let mut new_min = self.radii.min * (new_max / old_radius);
        if new_max < 0.0 {
            new_max = MAX_RADIUS_FLOOR;
        }
        if new_min < 0.0 {
            new_min = MIN_RADIUS_FLOOR;
        }

        self.radii_transformed = SoundRadii::new(new_min, new_max);
    }
}

#[derive(Debug)]
pub struct Speaker {
    spawn_args: Rc<SpawnArgs>,
    state: Rc<RefCell<SpeakerState>>,
    class_bounds: Aabb,
    drag_planes: DragPlanes,
    _subscriptions: Vec<KeySubscription>,
}

impl Speaker {
    #[must_use]
    pub fn new(
        spawn_args: &Rc<SpawnArgs>,
        observers: &KeyObserverMap,
        sound_manager: Option<Rc<dyn SoundManager>>,
        on_component_changed: &SelectionChangedFn,
    ) -> Self {
        let class_bounds = spawn_args
            .entity_class()
            .bounds()
            .unwrap_or(Aabb::new(DVec3::ZERO, DVec3::splat(8.0)));
        let state = Rc::new(RefCell::new(SpeakerState::default()));

        let subscriptions = vec![
            observe_state(observers, OriginKey::KEY, &state, |state, value| {
                state.origin_key.on_key_value_changed(value);
                state.origin = state.origin_key.get();
            }),
            observe_state(observers, SHADER_KEY, &state, move |state, value| {
                let defaults = if value.is_empty() {
                    SoundRadii::default()
                } else {
                    sound_manager
                        .as_ref()
                        .and_then(|manager| manager.shader_radii(value))
                        .unwrap_or_default()
                };
                state.shader_changed(defaults);
            }),
            observe_state(observers, MIN_DISTANCE_KEY, &state, SpeakerState::min_changed),
            observe_state(observers, MAX_DISTANCE_KEY, &state, SpeakerState::max_changed),
        ];

        Self {
            spawn_args: spawn_args.clone(),
            state,
            class_bounds,
            drag_planes: DragPlanes::new(on_component_changed),
            _subscriptions: subscriptions,
        }
    }

    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.state.borrow().origin
    }

    /// Working radii in map units.
    #[must_use]
    pub fn radii(&self) -> SoundRadii {
        self.state.borrow().radii_transformed
    }

    #[must_use]
    pub fn default_radii(&self) -> SoundRadii {
        self.state.borrow().default_radii
    }

    #[must_use]
    pub fn drag_planes(&self) -> &DragPlanes {
        &self.drag_planes
    }

    /// The class box at the committed origin.
    #[must_use]
    pub fn speaker_aabb(&self) -> Aabb {
        Aabb::new(self.state.borrow().origin_key.get(), self.class_bounds.extents)
    }
}

fn metres_value(units: f64) -> String {
    let metres = units / METRES_TO_UNITS;
    format_float((metres * 1e6).round() / 1e6)
}

impl Transformable for Speaker {
    fn revert_transform(&mut self) {
        let mut state = self.state.borrow_mut();
        state.origin = state.origin_key.get();
        state.radii_transformed = state.radii;
    }

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        let mut state = self.state.borrow_mut();
        if delta.is_component() {
            let current = state.border(&self.class_bounds);
            self.drag_planes.bounds = current;
            let resized = self
                .drag_planes
                .evaluate_resize(context.parent_translation(delta.translation));
            state.set_radius_from_aabb(&resized, &current, context.settings.drag_resize_symmetrically);
        } else {
            state.origin += context.parent_translation(delta.translation);
        }
    }

    fn freeze_transform(&mut self) {
        let (origin, radii, defaults) = {
            let mut state = self.state.borrow_mut();
            state.radii = state.radii_transformed;
            (state.origin, state.radii, state.default_radii)
        };
        OriginKey::new(origin).write(&self.spawn_args);

        if !self.spawn_args.get_key_value(SHADER_KEY).is_empty() {
            if radii.max == defaults.max {
                self.spawn_args.set_key_value(MAX_DISTANCE_KEY, "");
            } else {
                self.spawn_args.set_key_value(MAX_DISTANCE_KEY, &metres_value(radii.max));
            }
            if radii.min == defaults.min {
                self.spawn_args.set_key_value(MIN_DISTANCE_KEY, "");
            } else {
                self.spawn_args.set_key_value(MIN_DISTANCE_KEY, &metres_value(radii.min));
            }
        }
    }
}

impl Snappable for Speaker {
    fn snap_to(&mut self, grid: f64) {
        let origin = snap_vec3(self.state.borrow().origin_key.get(), grid);
        OriginKey::new(origin).write(&self.spawn_args);
    }
}

impl ComponentEditable for Speaker {
    // faces are picked through select_planes only
    fn test_select_components(
        &self,
        _selector: &mut dyn Selector,
        _test: &dyn SelectionTest,
        _local_to_world: &DAffine3,
        _mode: ComponentMode,
    ) {
    }

    fn set_selected_components(&self, _selected: bool, mode: ComponentMode) {
        if mode == ComponentMode::Face {
            self.drag_planes.set_selected(false);
        }
    }

    fn invert_selected_components(&self, _mode: ComponentMode) {}

    fn is_component_selected(&self) -> bool {
        self.drag_planes.is_selected()
    }

    fn selected_components_bounds(&self) -> Aabb {
        Aabb::INVALID
    }
}

impl PlaneSelectable for Speaker {
    fn select_planes(
        &mut self,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        on_plane: &mut dyn FnMut(&Plane3),
    ) {
        let aabb = self.local_aabb();
        self.drag_planes
            .select_planes(&aabb, selector, test, local_to_world, |plane| on_plane(plane));
    }

    fn select_reversed_planes(&mut self, selector: &mut dyn Selector, selected_planes: &[Plane3]) {
        let aabb = self.local_aabb();
        self.drag_planes
            .select_reversed_planes(&aabb, selector, selected_planes);
    }
}

impl EntityGeometry for Speaker {
    fn local_to_parent(&self) -> DAffine3 {
        DAffine3::from_translation(self.state.borrow().origin)
    }

    fn local_aabb(&self) -> Aabb {
        self.state.borrow().border(&self.class_bounds)
    }

    fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        test.test_aabb(&self.class_bounds, local_to_world)
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        collector.add_geometry(
            &ShaderHandle::colour(colour),
            geometry::aabb_wireframe(&self.class_bounds, local_to_world, colour),
        );

        let radii = self.radii();
        let centre = local_to_world.transform_point3(self.class_bounds.origin);
        let shader = ShaderHandle::named(shaders::SPEAKER_RADIUS);
        for radius in [radii.min, radii.max] {
            if radius > 0.0 {
                collector.add_geometry(&shader, geometry::sphere_wireframe(centre, radius, colour));
            }
        }
    }
}
