//! Brush-based entities (`func_static`, `worldspawn`, doors, ...).
//!
//! Such an entity is either a **container** that owns child primitives, or a
//! **model**. It is a container while its `model` key equals its `name`
//! key (and always for `worldspawn`), and a model otherwise:
//!
//! - container: the local-to-parent transform is the identity, the origin
//!   is only a pivot. Transforms are forwarded to the children.
//! - model: origin and rotation form the local-to-parent transform.
//!
//! Editing `name` or `model` switches between the two at any time. Renaming
//! a container keeps `model` equal to the new name.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::{DAffine3, DVec3};

use super::key_observer::{KeyObserverMap, KeySubscription};
use super::name_tracker::NAME_KEY;
use super::node::{EntityGeometry, observe_state};
use super::origin_key::OriginKey;
use super::rotation_key::{RotationKey, RotationMatrix};
use super::spawn_args::SpawnArgs;
use crate::curve::{Curve, CurveKind, CurveNode};
use crate::math::{Aabb, snap_vec3};
use crate::render::{RenderableCollector, ShaderHandle, geometry, shaders};
use crate::selection::{
    ComponentEditable, ComponentMode, SelectionChangedFn, SelectionIntersection, SelectionTest, Selector,
    VertexInstance,
};
use crate::transform::{ComponentSnappable, Snappable, TransformContext, TransformDelta, Transformable};

pub const MODEL_KEY: &str = "model";

/// Pick box of a model without curves.
const MODEL_PICK_EXTENTS: f64 = 8.0;

#[derive(Debug, Default)]
struct StaticGeometryState {
    origin_key: OriginKey,
    origin: DVec3,
    rotation_key: RotationKey,
    rotation: RotationMatrix,
    name: String,
    model: String,
    is_worldspawn: bool,
    is_model: bool,
}

impl StaticGeometryState {
    fn update_is_model(&mut self) {
        let is_model = self.model != self.name && !self.is_worldspawn;
        if is_model != self.is_model {
            log::debug!(
                "Entity '{}' switches to {} mode",
                self.name,
                if is_model { "model" } else { "container" }
            );
        }
        self.is_model = is_model;
    }

    fn local_to_parent(&self) -> DAffine3 {
        if self.is_model {
            DAffine3::from_translation(self.origin) * DAffine3::from_mat3(self.rotation.matrix())
        } else {
            DAffine3::IDENTITY
        }
    }

    /// The origin in local space: containers keep it in parent space,
    /// models are centred on it.
    fn local_origin(&self) -> DVec3 {
        if self.is_model { DVec3::ZERO } else { self.origin }
    }
}

#[derive(Debug)]
pub struct StaticGeometry {
    spawn_args: Rc<SpawnArgs>,
    state: Rc<RefCell<StaticGeometryState>>,
    nurbs: Rc<RefCell<Curve>>,
    catmull_rom: Rc<RefCell<Curve>>,
    origin_vertex: VertexInstance,
    _subscriptions: Vec<KeySubscription>,
}

impl StaticGeometry {
    #[must_use]
    pub fn new(
        spawn_args: &Rc<SpawnArgs>,
        observers: &KeyObserverMap,
        curve_subdivisions: usize,
        on_component_changed: &SelectionChangedFn,
    ) -> Self {
        let state = Rc::new(RefCell::new(StaticGeometryState {
            is_worldspawn: spawn_args.is_worldspawn(),
            ..StaticGeometryState::default()
        }));
        let nurbs = Rc::new(RefCell::new(Curve::new(
            CurveKind::Nurbs,
            curve_subdivisions,
            on_component_changed.clone(),
        )));
        let catmull_rom = Rc::new(RefCell::new(Curve::new(
            CurveKind::CatmullRom,
            curve_subdivisions,
            on_component_changed.clone(),
        )));

        let mut subscriptions = vec![
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
            observe_state(observers, CurveKind::Nurbs.key(), &nurbs, Curve::on_key_value_changed),
            observe_state(observers, CurveKind::CatmullRom.key(), &catmull_rom, Curve::on_key_value_changed),
        ];

        let weak_args = Rc::downgrade(spawn_args);
        {
            let state = Rc::downgrade(&state);
            let weak_args = weak_args.clone();
            subscriptions.push(observers.observe_key(MODEL_KEY, move |value| {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let is_model = {
                    let mut state = state.borrow_mut();
                    value.clone_into(&mut state.model);
                    state.update_is_model();
                    state.is_model
                };
                set_container_flag(&weak_args, is_model);
            }));
        }
        {
            let state = Rc::downgrade(&state);
            subscriptions.push(observers.observe_key(NAME_KEY, move |value| {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let (follow, is_model) = {
                    let mut state = state.borrow_mut();
                    let was_container = !state.is_model && !state.is_worldspawn;
                    value.clone_into(&mut state.name);
                    let follow = was_container && !value.is_empty() && state.model != value;
                    if !follow {
                        state.update_is_model();
                    }
                    (follow, state.is_model)
                };
                if follow {
                    // the model callback recomputes the mode
                    if let Some(args) = weak_args.upgrade() {
                        args.set_key_value(MODEL_KEY, value);
                    }
                } else {
                    set_container_flag(&weak_args, is_model);
                }
            }));
        }

        Self {
            spawn_args: spawn_args.clone(),
            state,
            nurbs,
            catmull_rom,
            origin_vertex: VertexInstance::new(on_component_changed.clone()),
            _subscriptions: subscriptions,
        }
    }

    /// True in model mode, false for containers.
    #[must_use]
    pub fn is_model(&self) -> bool {
        self.state.borrow().is_model
    }

    /// Working origin.
    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.state.borrow().origin
    }

    #[must_use]
    pub fn rotation(&self) -> RotationMatrix {
        self.state.borrow().rotation
    }

    #[must_use]
    pub fn curve(&self, kind: CurveKind) -> &Rc<RefCell<Curve>> {
        match kind {
            CurveKind::Nurbs => &self.nurbs,
            CurveKind::CatmullRom => &self.catmull_rom,
        }
    }

    #[must_use]
    pub fn origin_vertex(&self) -> &VertexInstance {
        &self.origin_vertex
    }

    /// The committed origin of a container, which its children are offset
    /// by while the map is saved. `None` for models.
    #[must_use]
    pub fn child_origin_offset(&self) -> Option<DVec3> {
        let state = self.state.borrow();
        (!state.is_model).then(|| state.origin_key.get())
    }

    fn curves(&self) -> [&Rc<RefCell<Curve>>; 2] {
        [&self.nurbs, &self.catmull_rom]
    }

    fn snap_origin(&self, grid: f64) {
        let origin = snap_vec3(self.state.borrow().origin_key.get(), grid);
        OriginKey::new(origin).write(&self.spawn_args);
    }
}

fn set_container_flag(spawn_args: &Weak<SpawnArgs>, is_model: bool) {
    if let Some(args) = spawn_args.upgrade() {
        args.set_is_container(!is_model);
    }
}

impl Transformable for StaticGeometry {
    fn revert_transform(&mut self) {
        {
            let mut state = self.state.borrow_mut();
            state.origin = state.origin_key.get();
            if state.is_model {
                state.rotation = state.rotation_key.get();
            }
        }
        for curve in self.curves() {
            curve.borrow_mut().revert_transform();
        }
    }

    fn evaluate_transform(&mut self, delta: &TransformDelta, context: &TransformContext<'_>) {
        let mut state = self.state.borrow_mut();
        // curve points live in local space
        let local_to_world = context.parent_to_world * state.local_to_parent();
        let curve_matrix = local_to_world.inverse() * delta.matrix() * local_to_world;

        if delta.is_component() {
            for curve in self.curves() {
                let mut curve = curve.borrow_mut();
                if curve.edit_instance().is_selected() {
                    curve.transform(&curve_matrix, true);
                }
            }
            if self.origin_vertex.is_selected() {
                state.origin = state.origin_key.get() + context.parent_translation(delta.translation);
            }
            return;
        }

        state.origin = context.transform_point(delta, state.origin);
        if state.is_model {
            state.rotation.rotate(delta.rotation);
        } else {
            for curve in self.curves() {
                curve.borrow_mut().transform(&curve_matrix, false);
            }
        }
    }

    fn freeze_transform(&mut self) {
        let (origin, rotation, is_model) = {
            let state = self.state.borrow();
            (state.origin, state.rotation, state.is_model)
        };
        OriginKey::new(origin).write(&self.spawn_args);
        if is_model {
            RotationKey::write(&rotation, &self.spawn_args, true);
        }

        for curve in self.curves() {
            curve.borrow_mut().freeze_transform();
            Curve::write(curve, &self.spawn_args);
        }
        self.revert_transform();
    }

    fn forwards_to_children(&self) -> bool {
        !self.is_model()
    }
}

impl Snappable for StaticGeometry {
    fn snap_to(&mut self, grid: f64) {
        self.snap_origin(grid);
    }
}

impl ComponentSnappable for StaticGeometry {
    fn snap_components(&mut self, grid: f64) {
        for curve in self.curves() {
            if curve.borrow().edit_instance().is_selected() {
                curve.borrow_mut().snap_selected(grid);
                Curve::write(curve, &self.spawn_args);
            }
        }
        if self.origin_vertex.is_selected() {
            self.snap_origin(grid);
        }
    }
}

impl ComponentEditable for StaticGeometry {
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
        let origin = local_to_world.transform_point3(self.state.borrow().local_origin());
        self.origin_vertex.test_select(origin, selector, test);
        for curve in self.curves() {
            curve.borrow().test_select(selector, test, local_to_world);
        }
    }

    fn set_selected_components(&self, selected: bool, mode: ComponentMode) {
        if mode == ComponentMode::Vertex {
            for curve in self.curves() {
                curve.borrow().edit_instance().set_selected(selected);
            }
            self.origin_vertex.set_selected(selected);
        }
    }

    fn invert_selected_components(&self, mode: ComponentMode) {
        if mode == ComponentMode::Vertex {
            for curve in self.curves() {
                curve.borrow().edit_instance().invert_selected();
            }
            self.origin_vertex.invert_selected();
        }
    }

    fn is_component_selected(&self) -> bool {
        self.curves()
            .iter()
            .any(|curve| curve.borrow().edit_instance().is_selected())
            || self.origin_vertex.is_selected()
    }

    fn selected_components_bounds(&self) -> Aabb {
        let mut aabb = Aabb::INVALID;
        for curve in self.curves() {
            aabb.include_aabb(&curve.borrow().selected_bounds());
        }
        if self.origin_vertex.is_selected() {
            aabb.include_point(self.state.borrow().local_origin());
        }
        aabb
    }
}

impl CurveNode for StaticGeometry {
    fn has_empty_curve(&self) -> bool {
        self.curves().iter().all(|curve| curve.borrow().is_empty())
    }

    fn append_control_points(&self, count: usize) {
        for curve in self.curves() {
            if !curve.borrow().is_empty() {
                curve.borrow_mut().append_control_points(count);
                Curve::write(curve, &self.spawn_args);
            }
        }
    }

    fn remove_selected_control_points(&self) {
        for curve in self.curves() {
            if !curve.borrow().edit_instance().is_selected() {
                continue;
            }
            let changed = curve.borrow_mut().remove_selected_control_points();
            if changed {
                Curve::write(curve, &self.spawn_args);
            }
        }
    }

    fn insert_control_points_at_selected(&self) {
        for curve in self.curves() {
            if !curve.borrow().edit_instance().is_selected() {
                continue;
            }
            let changed = curve.borrow_mut().insert_control_points_at_selected();
            if changed {
                Curve::write(curve, &self.spawn_args);
            }
        }
    }

    fn convert_curve_type(&self) {
        let nurbs_empty = self.nurbs.borrow().is_empty();
        let catmull_rom_empty = self.catmull_rom.borrow().is_empty();
        let from = match (nurbs_empty, catmull_rom_empty) {
            (false, true) => CurveKind::Nurbs,
            (true, false) => CurveKind::CatmullRom,
            _ => {
                log::warn!("Curve conversion needs exactly one curve on the entity");
                return;
            }
        };
        let value = self.spawn_args.get_key_value(from.key());
        self.spawn_args.set_key_value(from.key(), "");
        self.spawn_args.set_key_value(from.other().key(), &value);
    }
}

impl EntityGeometry for StaticGeometry {
    fn local_to_parent(&self) -> DAffine3 {
        self.state.borrow().local_to_parent()
    }

    fn local_aabb(&self) -> Aabb {
        let mut aabb = self.nurbs.borrow().bounds();
        aabb.include_aabb(&self.catmull_rom.borrow().bounds());

        let state = self.state.borrow();
        if aabb.is_valid() || !state.is_model {
            aabb.include_point(state.local_origin());
        }
        aabb
    }

    fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        let mut best: Option<SelectionIntersection> = None;
        for curve in self.curves() {
            let curve = curve.borrow();
            let points: Vec<DVec3> = curve
                .tessellation()
                .iter()
                .map(|point| local_to_world.transform_point3(*point))
                .collect();
            if let Some(hit) = test.test_line_strip(&points) {
                if best.is_none_or(|current| hit.is_closer_than(&current)) {
                    best = Some(hit);
                }
            }
        }
        if best.is_none() && self.is_model() {
            best = test.test_aabb(&Aabb::new(DVec3::ZERO, DVec3::splat(MODEL_PICK_EXTENTS)), local_to_world);
        }
        best
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        let curve_shader = ShaderHandle::named(shaders::CURVE);
        let mut selected = Vec::new();
        let mut deselected = Vec::new();

        for curve in self.curves() {
            let curve = curve.borrow();
            if curve.is_empty() {
                continue;
            }
            let to_world = |point: &DVec3| local_to_world.transform_point3(*point);
            collector.add_geometry(
                &curve_shader,
                geometry::line_strip(curve.tessellation().iter().map(to_world), colour),
            );
            let edit = curve.edit_instance();
            for (index, point) in curve.transformed_points().iter().enumerate() {
                if edit.selectables()[index].is_selected() {
                    selected.push(to_world(point));
                } else {
                    deselected.push(to_world(point));
                }
            }
        }

        let state = self.state.borrow();
        if !state.is_model {
            let origin = local_to_world.transform_point3(state.origin);
            if self.origin_vertex.is_selected() {
                selected.push(origin);
            } else {
                deselected.push(origin);
            }
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
}
