//! Lights
//!
//! A point light is a box of half size `light_radius` around its origin with
//! an optional offset `light_center`. A projected light instead carries the
//! frustum vectors `light_target`, `light_up`, `light_right` and, optionally,
//! the near/far clip points `light_start` / `light_end`. All vectors are
//! relative to the light origin; `light_up` and `light_right` are relative to
//! the target.
//!
//! In vertex mode the center (point lights) or the frustum points (projected
//! lights) are selectable, in face mode the radius box can be drag-resized.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::key_observer::{KeyObserverMap, KeySubscription};
use super::node::{EntityGeometry, observe_state};
use super::origin_key::OriginKey;
use super::rotation_key::{RotationKey, RotationMatrix};
use super::spawn_args::SpawnArgs;
use crate::math::{Aabb, Plane3, format_vec3, parse_vec3, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry, shaders};
use crate::selection::{
    ComponentEditable, ComponentMode, DragPlanes, PlaneSelectable, SelectionChangedFn, SelectionIntersection,
    SelectionTest, Selector, VertexInstance, VertexInstanceRelative,
};
use crate::transform::{ComponentSnappable, Snappable, TransformContext, TransformDelta, TransformKind, Transformable};

pub const RADIUS_KEY: &str = "light_radius";
pub const CENTER_KEY: &str = "light_center";
pub const LIGHT_ROTATION_KEY: &str = "light_rotation";
pub const TARGET_KEY: &str = "light_target";
pub const UP_KEY: &str = "light_up";
pub const RIGHT_KEY: &str = "light_right";
pub const START_KEY: &str = "light_start";
pub const END_KEY: &str = "light_end";

pub const DEFAULT_LIGHT_RADIUS: DVec3 = DVec3::splat(320.0);

const MIN_RADIUS: f64 = 0.01;

/// The frustum vectors of a projected light, relative to the light origin
/// (`up` and `right` relative to `target`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightProjection {
    pub target: DVec3,
    pub up: DVec3,
    pub right: DVec3,
    pub start: DVec3,
    pub end: DVec3,
}

/// `light_start` must be closer to the origin than `light_end`. Swaps them
/// if not, and falls back to the plain target frustum if they coincide.
#[must_use]
pub fn check_start_end(mut start: DVec3, mut end: DVec3, target: DVec3) -> (DVec3, DVec3) {
    if end.length_squared() < start.length_squared() {
        std::mem::swap(&mut start, &mut end);
    }
    if end == start {
        end = target;
        start = DVec3::ZERO;
    }
    (start, end)
}

#[derive(Debug, Clone, Copy, Default)]
struct ProjectionKeys {
    target: bool,
    up: bool,
    right: bool,
    start: bool,
    end: bool,
}

#[derive(Debug, Default)]
struct LightState {
    origin_key: OriginKey,
    origin: DVec3,
    rotation_key: RotationKey,
    light_rotation: Option<RotationMatrix>,
    rotation: RotationMatrix,
    radius: DVec3,
    radius_transformed: DVec3,
    center: DVec3,
    center_transformed: DVec3,
    projection: LightProjection,
    projection_transformed: LightProjection,
    used: ProjectionKeys,
}

impl LightState {
    fn is_projected(&self) -> bool {
        self.used.target && self.used.up && self.used.right
    }

    fn use_start_end(&self) -> bool {
        self.used.start && self.used.end
    }

    fn committed_rotation(&self) -> RotationMatrix {
        self.light_rotation.unwrap_or_else(|| self.rotation_key.get())
    }

    /// The committed frustum with the start/end ordering applied.
    fn committed_projection(&self) -> LightProjection {
        let mut projection = self.projection;
        if self.use_start_end() {
            (projection.start, projection.end) = check_start_end(projection.start, projection.end, projection.target);
        }
        projection
    }

    fn revert(&mut self) {
        self.origin = self.origin_key.get();
        self.rotation = self.committed_rotation();
        self.radius_transformed = self.radius;
        self.center_transformed = self.center;
        self.projection_transformed = self.committed_projection();
    }

    fn projection_changed(&mut self, value: &str, apply: impl FnOnce(&mut LightProjection, &mut ProjectionKeys, DVec3)) {
        let parsed = parse_vec3(value).unwrap_or(DVec3::ZERO);
        apply(&mut self.projection, &mut self.used, parsed);
        self.projection_transformed = self.committed_projection();
    }

    fn set_radius_from_aabb(&mut self, aabb: &Aabb, symmetric: bool) {
        if symmetric {
            let delta = aabb.extents - self.radius_transformed;
            self.radius_transformed = (self.radius_transformed + delta * 2.0).max(DVec3::splat(MIN_RADIUS));
        } else {
            self.origin = aabb.origin;
            self.radius_transformed = aabb.extents;
        }
    }

    /// Pushes a start point lying in front of the origin plane back onto it.
    fn ensure_start_constraints(&mut self, grid: f64) {
        let projection = &mut self.projection_transformed;
        let assumed_end = if self.used.end { projection.end } else { projection.target };
        let normal = (projection.start - assumed_end).normalize_or_zero();
        let dist = normal.dot(projection.start);
        if dist > 0.0 {
            projection.start = snap_vec3(projection.start - normal * dist, grid);
        }
    }

    fn local_to_parent(&self) -> DAffine3 {
        DAffine3::from_translation(self.origin) * DAffine3::from_mat3(self.rotation.matrix())
    }

    fn light_aabb(&self) -> Aabb {
        if self.is_projected() {
            let projection = &self.projection_transformed;
            let mut aabb = Aabb::new(DVec3::ZERO, DVec3::ZERO);
            aabb.include_point(projection.target);
            aabb.include_point(projection.target + projection.right);
            aabb.include_point(projection.target + projection.up);
            if self.use_start_end() {
                aabb.include_point(projection.start);
                aabb.include_point(projection.end);
            }
            aabb
        } else {
            let mut aabb = Aabb::new(DVec3::ZERO, self.radius_transformed);
            aabb.include_point(self.center_transformed);
            aabb
        }
    }
}

/// Moves `point` (local space) by `translation` (world space).
fn translated_local(local_to_world: &DAffine3, point: DVec3, translation: DVec3) -> DVec3 {
    local_to_world
        .inverse()
        .transform_point3(local_to_world.transform_point3(point) + translation)
}

#[derive(Debug)]
struct LightVertices {
    center: VertexInstance,
    target: VertexInstance,
    right: VertexInstanceRelative,
    up: VertexInstanceRelative,
    start: VertexInstance,
    end: VertexInstance,
}

impl LightVertices {
    fn new(on_changed: &SelectionChangedFn) -> Self {
        Self {
            center: VertexInstance::new(on_changed.clone()),
            target: VertexInstance::new(on_changed.clone()),
            right: VertexInstanceRelative::new(on_changed.clone()),
            up: VertexInstanceRelative::new(on_changed.clone()),
            start: VertexInstance::new(on_changed.clone()),
            end: VertexInstance::new(on_changed.clone()),
        }
    }

    fn set_selected(&self, selected: bool) {
        self.center.set_selected(selected);
        self.target.set_selected(selected);
        self.right.set_selected(selected);
        self.up.set_selected(selected);
        self.start.set_selected(selected);
        self.end.set_selected(selected);
    }

    fn invert_selected(&self, projected: bool) {
        if projected {
            self.target.invert_selected();
            self.right.invert_selected();
            self.up.invert_selected();
            self.start.invert_selected();
            self.end.invert_selected();
        } else {
            self.center.invert_selected();
        }
    }

    fn any_projection_selected(&self) -> bool {
        self.target.is_selected()
            || self.right.is_selected()
            || self.up.is_selected()
            || self.start.is_selected()
            || self.end.is_selected()
    }
}

#[derive(Debug)]
pub struct Light {
    spawn_args: Rc<SpawnArgs>,
    state: Rc<RefCell<LightState>>,
    light_box: Aabb,
    vertices: LightVertices,
    drag_planes: DragPlanes,
    _subscriptions: Vec<KeySubscription>,
}

impl Light {
    #[must_use]
    pub fn new(spawn_args: &Rc<SpawnArgs>, observers: &KeyObserverMap, on_component_changed: &SelectionChangedFn) -> Self {
        let light_box = Aabb::new(DVec3::ZERO, DVec3::splat(8.0));
        let state = Rc::new(RefCell::new(LightState {
            radius: DEFAULT_LIGHT_RADIUS,
            radius_transformed: DEFAULT_LIGHT_RADIUS,
            ..LightState::default()
        }));

        let subscriptions = vec![
            observe_state(observers, OriginKey::KEY, &state, |state, value| {
                state.origin_key.on_key_value_changed(value);
                state.origin = state.origin_key.get();
            }),
            observe_state(observers, "angle", &state, |state, value| {
                state.rotation_key.on_angle_changed(value);
                state.rotation = state.committed_rotation();
            }),
            observe_state(observers, RotationKey::KEY, &state, |state, value| {
                state.rotation_key.on_rotation_changed(value);
                state.rotation = state.committed_rotation();
            }),
            observe_state(observers, RADIUS_KEY, &state, |state, value| {
                state.radius = parse_vec3(value).unwrap_or(DEFAULT_LIGHT_RADIUS);
                state.radius_transformed = state.radius;
            }),
            observe_state(observers, CENTER_KEY, &state, |state, value| {
                state.center = parse_vec3(value).unwrap_or(DVec3::ZERO);
                state.center_transformed = state.center;
            }),
            observe_state(observers, LIGHT_ROTATION_KEY, &state, |state, value| {
                state.light_rotation = (!value.is_empty()).then(|| RotationMatrix::parse(value));
                state.rotation = state.committed_rotation();
            }),
            observe_state(observers, TARGET_KEY, &state, |state, value| {
                state.projection_changed(value, |projection, used, parsed| {
                    used.target = !value.is_empty();
                    projection.target = parsed;
                });
            }),
            observe_state(observers, UP_KEY, &state, |state, value| {
                state.projection_changed(value, |projection, used, parsed| {
                    used.up = !value.is_empty();
                    projection.up = parsed;
                });
            }),
            observe_state(observers, RIGHT_KEY, &state, |state, value| {
                state.projection_changed(value, |projection, used, parsed| {
                    used.right = !value.is_empty();
                    projection.right = parsed;
                });
            }),
            observe_state(observers, START_KEY, &state, |state, value| {
                state.projection_changed(value, |projection, used, parsed| {
                    used.start = !value.is_empty();
                    projection.start = parsed;
                });
            }),
            observe_state(observers, END_KEY, &state, |state, value| {
                state.projection_changed(value, |projection, used, parsed| {
                    used.end = !value.is_empty();
                    projection.end = parsed;
                });
            }),
        ];

        Self {
            spawn_args: spawn_args.clone(),
            state,
            light_box,
            vertices: LightVertices::new(on_component_changed),
            drag_planes: DragPlanes::new(on_component_changed),
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

    /// Working radius of a point light.
    #[must_use]
    pub fn radius(&self) -> DVec3 {
        self.state.borrow().radius_transformed
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        self.state.borrow().center_transformed
    }

    /// Working frustum vectors.
    #[must_use]
    pub fn projection(&self) -> LightProjection {
        self.state.borrow().projection_transformed
    }

    /// True if target, up and right are all set.
    #[must_use]
    pub fn is_projected(&self) -> bool {
        self.state.borrow().is_projected()
    }

    /// True if both start and end are set.
    #[must_use]
    pub fn use_start_end(&self) -> bool {
        self.state.borrow().use_start_end()
    }

    #[must_use]
    pub fn drag_planes(&self) -> &DragPlanes {
        &self.drag_planes
    }

    fn radius_box(&self) -> Aabb {
        Aabb::new(DVec3::ZERO, self.state.borrow().radius_transformed)
    }

    fn evaluate_vertices(&self, state: &mut LightState, translation: DVec3, local_to_world: &DAffine3, grid: f64) {
        let base = state.projection_transformed;

        if self.vertices.center.is_selected() {
            state.center_transformed = translated_local(local_to_world, state.center_transformed, translation);
        }
        if self.vertices.target.is_selected() {
            state.projection_transformed.target = translated_local(local_to_world, base.target, translation);
        }
        if self.vertices.start.is_selected() {
            state.projection_transformed.start = translated_local(local_to_world, base.start, translation);
            state.ensure_start_constraints(grid);
        }
        if self.vertices.end.is_selected() {
            state.projection_transformed.end = translated_local(local_to_world, base.end, translation);
            state.ensure_start_constraints(grid);
        }

        // up and right are relative to the committed target
        let target_to_world = *local_to_world * DAffine3::from_translation(base.target);
        if self.vertices.right.is_selected() {
            state.projection_transformed.right = translated_local(&target_to_world, base.right, translation);
        }
        if self.vertices.up.is_selected() {
            state.projection_transformed.up = translated_local(&target_to_world, base.up, translation);
        }
    }

    fn snap_projection(&self, state: &mut LightState, grid: f64) {
        let use_start_end = state.use_start_end();
        let snap_all = !self.vertices.any_projection_selected();
        let projection = &mut state.projection_transformed;

        if snap_all || self.vertices.target.is_selected() {
            projection.target = snap_vec3(projection.target, grid);
        }
        if snap_all || self.vertices.right.is_selected() {
            projection.right = snap_vec3(projection.right, grid);
        }
        if snap_all || self.vertices.up.is_selected() {
            projection.up = snap_vec3(projection.up, grid);
        }
        if use_start_end {
            if snap_all || self.vertices.end.is_selected() {
                projection.end = snap_vec3(projection.end, grid);
            }
            if snap_all || self.vertices.start.is_selected() {
                projection.start = snap_vec3(projection.start, grid);
            }
        }
    }
}

impl Transformable for Light {
    fn revert_transform(&mut self) {
        self.state.borrow_mut().revert();
    }

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        let mut state = self.state.borrow_mut();
        match delta.kind {
            TransformKind::Primitive => {
                state.origin = context.transform_point(delta, state.origin);
                state.rotation.rotate(delta.rotation);
            }
            TransformKind::Component(ComponentMode::Vertex) => {
                let local_to_world = context.parent_to_world * state.local_to_parent();
                let grid = context.settings.light_vertex_snap_grid;
                self.evaluate_vertices(&mut state, delta.translation, &local_to_world, grid);
            }
            TransformKind::Component(ComponentMode::Face) => {
                self.drag_planes.bounds = Aabb::new(state.origin, state.radius_transformed);
                let rotation = state.rotation.matrix();
                let resized = self
                    .drag_planes
                    .evaluate_resize_rotated(context.parent_translation(delta.translation), &rotation);
                state.set_radius_from_aabb(&resized, context.settings.drag_resize_symmetrically);
            }
        }
    }

    fn freeze_transform(&mut self) {
        let (origin, rotation, projected, used, projection, center, radius, has_light_rotation) = {
            let state = self.state.borrow();
            let mut projection = state.projection_transformed;
            if state.use_start_end() {
                (projection.start, projection.end) =
                    check_start_end(projection.start, projection.end, projection.target);
            }
            (
                state.origin,
                state.rotation,
                state.is_projected(),
                state.used,
                projection,
                state.center_transformed,
                state.radius_transformed,
                state.light_rotation.is_some(),
            )
        };

        let args = &self.spawn_args;
        OriginKey::new(origin).write(args);

        if projected {
            for (key, value, is_used) in [
                (TARGET_KEY, projection.target, used.target),
                (UP_KEY, projection.up, used.up),
                (RIGHT_KEY, projection.right, used.right),
                (START_KEY, projection.start, used.start),
                (END_KEY, projection.end, used.end),
            ] {
                if is_used {
                    args.set_key_value(key, &format_vec3(value));
                }
            }
        } else {
            args.set_key_value(CENTER_KEY, &format_vec3(center));
        }

        if has_light_rotation {
            rotation.write_to(args, LIGHT_ROTATION_KEY);
        }
        rotation.write_to(args, RotationKey::KEY);

        if !projected {
            args.set_key_value(RADIUS_KEY, &format_vec3(radius));
        }

        self.revert_transform();
    }
}

impl Snappable for Light {
    fn snap_to(&mut self, grid: f64) {
        let origin = snap_vec3(self.state.borrow().origin_key.get(), grid);
        OriginKey::new(origin).write(&self.spawn_args);
    }
}

impl ComponentSnappable for Light {
    fn snap_components(&mut self, grid: f64) {
        {
            let mut state = self.state.borrow_mut();
            if state.is_projected() {
                self.snap_projection(&mut state, grid);
            } else {
                state.center_transformed = snap_vec3(state.center_transformed, grid);
            }
        }
        self.freeze_transform();
    }
}

impl ComponentEditable for Light {
    fn test_select_components(
        &self,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        mode: ComponentMode,
    ) {
        if mode != ComponentMode::Vertex {
            return;
        }
        let state = self.state.borrow();
        let to_world = |point: DVec3| local_to_world.transform_point3(point);
        if state.is_projected() {
            let projection = &state.projection_transformed;
            let target = to_world(projection.target);
            self.vertices.target.test_select(target, selector, test);
            self.vertices.right.test_select(
                target,
                local_to_world.transform_vector3(projection.right),
                selector,
                test,
            );
            self.vertices
                .up
                .test_select(target, local_to_world.transform_vector3(projection.up), selector, test);
            self.vertices.start.test_select(to_world(projection.start), selector, test);
            self.vertices.end.test_select(to_world(projection.end), selector, test);
        } else {
            self.vertices
                .center
                .test_select(to_world(state.center_transformed), selector, test);
        }
    }

    fn set_selected_components(&self, _selected: bool, mode: ComponentMode) {
        match mode {
            ComponentMode::Face => self.drag_planes.set_selected(false),
            ComponentMode::Vertex => self.vertices.set_selected(false),
        }
    }

    fn invert_selected_components(&self, mode: ComponentMode) {
        if mode == ComponentMode::Vertex {
            self.vertices.invert_selected(self.is_projected());
        }
    }

    fn is_component_selected(&self) -> bool {
        self.vertices.center.is_selected() || self.vertices.any_projection_selected() || self.drag_planes.is_selected()
    }

    fn selected_components_bounds(&self) -> Aabb {
        let state = self.state.borrow();
        let mut aabb = Aabb::INVALID;
        if state.is_projected() {
            let projection = &state.projection_transformed;
            if self.vertices.target.is_selected() {
                aabb.include_point(projection.target);
            }
            if self.vertices.right.is_selected() {
                aabb.include_point(projection.target + projection.right);
            }
            if self.vertices.up.is_selected() {
                aabb.include_point(projection.target + projection.up);
            }
            if self.vertices.start.is_selected() {
                aabb.include_point(projection.start);
            }
            if self.vertices.end.is_selected() {
                aabb.include_point(projection.end);
            }
        } else if self.vertices.center.is_selected() {
            aabb.include_point(state.center_transformed);
        }
        aabb
    }
}

impl PlaneSelectable for Light {
    fn select_planes(
        &mut self,
        selector: &mut dyn Selector,
        test: &dyn SelectionTest,
        local_to_world: &DAffine3,
        on_plane: &mut dyn FnMut(&Plane3),
    ) {
        let aabb = self.radius_box();
        self.drag_planes
            .select_planes(&aabb, selector, test, local_to_world, |plane| on_plane(plane));
    }

    fn select_reversed_planes(&mut self, selector: &mut dyn Selector, selected_planes: &[Plane3]) {
        let aabb = self.radius_box();
        self.drag_planes
            .select_reversed_planes(&aabb, selector, selected_planes);
    }
}

impl EntityGeometry for Light {
    fn local_to_parent(&self) -> DAffine3 {
        self.state.borrow().local_to_parent()
    }

    fn local_aabb(&self) -> Aabb {
        self.state.borrow().light_aabb()
    }

    fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        test.test_aabb(&self.light_box, local_to_world)
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        collector.add_geometry(
            &ShaderHandle::colour(colour),
            geometry::octahedron(&self.light_box, local_to_world, colour),
        );

        let state = self.state.borrow();
        let volume = ShaderHandle::named(shaders::LIGHT_VOLUME);
        let mut selected = Vec::new();
        let mut deselected = Vec::new();
        let mut sort_vertex = |point: DVec3, is_selected: bool| {
            let point = local_to_world.transform_point3(point);
            if is_selected {
                selected.push(point);
            } else {
                deselected.push(point);
            }
        };

        if state.is_projected() {
            let projection = &state.projection_transformed;
            collector.add_geometry(
                &volume,
                geometry::light_frustum(projection.target, projection.up, projection.right, local_to_world, colour),
            );
            sort_vertex(projection.target, self.vertices.target.is_selected());
            sort_vertex(projection.target + projection.right, self.vertices.right.is_selected());
            sort_vertex(projection.target + projection.up, self.vertices.up.is_selected());
            if state.use_start_end() {
                sort_vertex(projection.start, self.vertices.start.is_selected());
                sort_vertex(projection.end, self.vertices.end.is_selected());
            }
        } else {
            let radius = Aabb::new(DVec3::ZERO, state.radius_transformed);
            collector.add_geometry(&volume, geometry::aabb_wireframe(&radius, local_to_world, colour));
            sort_vertex(state.center_transformed, self.vertices.center.is_selected());
        }

        collector.add_geometry(
            &ShaderHandle::named(shaders::SELECTED_VERTEX),
            geometry::points(selected, colour),
        );
        collector.add_geometry(
            &ShaderHandle::named(shaders::DESELECTED_VERTEX),
            geometry::points(deselected, colour),
        );
    }

    fn render_solid(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        collector.add_geometry(
            &ShaderHandle::colour(colour),
            geometry::octahedron(&self.light_box, local_to_world, colour),
        );
    }
}
