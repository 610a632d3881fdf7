use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use glam::{DAffine3, DVec3};

use super::eclass_model::EclassModel;
use super::factory::EntityContext;
use super::generic::Generic;
use super::key_observer::{KeyObserverMap, KeySubscription};
use super::light::Light;
use super::name_tracker::NameTracker;
use super::spawn_args::{SpawnArgs, SpawnArgsObserver};
use super::speaker::Speaker;
use super::static_geometry::StaticGeometry;
use crate::curve::CurveNode;
use crate::math::{Aabb, parse_vec3};
use crate::render::{RenderableCollector, VolumeTest};
use crate::selection::{
    ComponentEditable, ObservedSelectable, PlaneSelectable, SelectionChangedFn, SelectionIntersection, SelectionTest,
};
use crate::target::TargetKeyCollection;
use crate::transform::{ComponentSnappable, Snappable, Transformable};

pub const COLOUR_KEY: &str = "_color";

/// Geometry every entity kind exposes to the scene.
pub trait EntityGeometry {
    /// Working transform relative to the parent node.
    fn local_to_parent(&self) -> DAffine3;

    /// Bounds in local space.
    fn local_aabb(&self) -> Aabb;

    /// Whole-entity pick test.
    fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        test.test_aabb(&self.local_aabb(), local_to_world)
    }

    fn render_wireframe(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3);

    fn render_solid(&self, collector: &mut dyn RenderableCollector, local_to_world: &DAffine3, colour: DVec3) {
        self.render_wireframe(collector, local_to_world, colour);
    }
}

/// Observes `key` and applies every value to the shared `state`.
///
/// The callback holds the state borrowed while `apply` runs, so `apply`
/// must not write spawnargs.
pub(crate) fn observe_state<S: 'static>(
    observers: &KeyObserverMap,
    key: &str,
    state: &Rc<RefCell<S>>,
    apply: impl Fn(&mut S, &str) + 'static,
) -> KeySubscription {
    let state = Rc::downgrade(state);
    observers.observe_key(key, move |value| {
        if let Some(state) = state.upgrade() {
            apply(&mut state.borrow_mut(), value);
        }
    })
}

/// The behaviour of an entity, picked from its class when it is created.
#[derive(Debug)]
pub enum EntityKind {
    StaticGeometry(StaticGeometry),
    Light(Light),
    Speaker(Speaker),
    EclassModel(EclassModel),
    Generic(Generic),
}

impl EntityKind {
    /// Classes deriving from `light` become lights, resizable classes
    /// brush-based entities. Fixed-size classes are speakers, models or
    /// plain boxes.
    pub(crate) fn create(
        spawn_args: &Rc<SpawnArgs>,
        observers: &KeyObserverMap,
        context: &EntityContext,
        on_component_changed: &SelectionChangedFn,
    ) -> Self {
        let eclass = spawn_args.entity_class().clone();
        if eclass.is_light() {
            Self::Light(Light::new(spawn_args, observers, on_component_changed))
        } else if !eclass.is_fixed_size() {
            Self::StaticGeometry(StaticGeometry::new(
                spawn_args,
                observers,
                context.curve_subdivisions,
                on_component_changed,
            ))
        } else if eclass.name().eq_ignore_ascii_case("speaker") {
            Self::Speaker(Speaker::new(
                spawn_args,
                observers,
                context.sound_manager.clone(),
                on_component_changed,
            ))
        } else if !eclass.attribute_value("model").is_empty() {
            Self::EclassModel(EclassModel::new(spawn_args, observers))
        } else {
            Self::Generic(Generic::new(spawn_args, observers))
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StaticGeometry(_) => "StaticGeometry",
            Self::Light(_) => "Light",
            Self::Speaker(_) => "Speaker",
            Self::EclassModel(_) => "EclassModel",
            Self::Generic(_) => "Generic",
        }
    }

    #[must_use]
    pub fn geometry(&self) -> &dyn EntityGeometry {
        match self {
            Self::StaticGeometry(inner) => inner,
            Self::Light(inner) => inner,
            Self::Speaker(inner) => inner,
            Self::EclassModel(inner) => inner,
            Self::Generic(inner) => inner,
        }
    }

    #[must_use]
    pub fn as_transformable(&self) -> Option<&dyn Transformable> {
        let transformable: &dyn Transformable = match self {
            Self::StaticGeometry(inner) => inner,
            Self::Light(inner) => inner,
            Self::Speaker(inner) => inner,
            Self::EclassModel(inner) => inner,
            Self::Generic(inner) => inner,
        };
        Some(transformable)
    }

    pub fn as_transformable_mut(&mut self) -> Option<&mut dyn Transformable> {
        let transformable: &mut dyn Transformable = match self {
            Self::StaticGeometry(inner) => inner,
            Self::Light(inner) => inner,
            Self::Speaker(inner) => inner,
            Self::EclassModel(inner) => inner,
            Self::Generic(inner) => inner,
        };
        Some(transformable)
    }

    pub fn as_snappable_mut(&mut self) -> Option<&mut dyn Snappable> {
        let snappable: &mut dyn Snappable = match self {
            Self::StaticGeometry(inner) => inner,
            Self::Light(inner) => inner,
            Self::Speaker(inner) => inner,
            Self::EclassModel(inner) => inner,
            Self::Generic(inner) => inner,
        };
        Some(snappable)
    }

    pub fn as_component_snappable_mut(&mut self) -> Option<&mut dyn ComponentSnappable> {
        match self {
            Self::StaticGeometry(inner) => Some(inner),
            Self::Light(inner) => Some(inner),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_component_editable(&self) -> Option<&dyn ComponentEditable> {
        match self {
            Self::StaticGeometry(inner) => Some(inner),
            Self::Light(inner) => Some(inner),
            Self::Speaker(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_plane_selectable_mut(&mut self) -> Option<&mut dyn PlaneSelectable> {
        match self {
            Self::Light(inner) => Some(inner),
            Self::Speaker(inner) => Some(inner),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_curve_node(&self) -> Option<&dyn CurveNode> {
        match self {
            Self::StaticGeometry(inner) => Some(inner),
            _ => None,
        }
    }
}

/// An entity: spawnargs plus the helpers that keep derived state in sync
/// with them.
pub struct EntityNode {
    kind: EntityKind,
    subscriptions: Vec<KeySubscription>,
    spawn_args: Rc<SpawnArgs>,
    key_observers: Rc<KeyObserverMap>,
    name_tracker: Rc<NameTracker>,
    target_keys: Rc<TargetKeyCollection>,
    observer_ids: [u64; 2],
    colour: Rc<Cell<DVec3>>,
    selectable: Rc<ObservedSelectable>,
    component_revision: Rc<Cell<u64>>,
}

impl EntityNode {
    /// Wires up an entity around `spawn_args`. The kind is picked from the
    /// entity class.
    #[must_use]
    pub fn new(spawn_args: Rc<SpawnArgs>, context: &EntityContext) -> Self {
        let key_observers = KeyObserverMap::new(&spawn_args);

        let name_tracker = NameTracker::new(&spawn_args);
        let target_keys = TargetKeyCollection::new();
        let tracker_observer: Rc<dyn SpawnArgsObserver> = name_tracker.clone();
        let targets_observer: Rc<dyn SpawnArgsObserver> = target_keys.clone();
        let observer_ids = [
            spawn_args.attach_observer(&tracker_observer),
            spawn_args.attach_observer(&targets_observer),
        ];

        let component_revision = Rc::new(Cell::new(0));
        let on_component_changed: SelectionChangedFn = {
            let revision = component_revision.clone();
            Rc::new(move |_: &ObservedSelectable| revision.set(revision.get() + 1))
        };

        let class_colour = spawn_args.entity_class().colour();
        let colour = Rc::new(Cell::new(class_colour));
        let subscriptions = vec![{
            let colour = colour.clone();
            key_observers.observe_key(COLOUR_KEY, move |value| {
                colour.set(parse_vec3(value).unwrap_or(class_colour));
            })
        }];

        let kind = EntityKind::create(&spawn_args, &key_observers, context, &on_component_changed);
        log::debug!("Created {} entity '{}'", kind.name(), spawn_args.classname());

        Self {
            kind,
            subscriptions,
            spawn_args,
            key_observers,
            name_tracker,
            target_keys,
            observer_ids,
            colour,
            selectable: ObservedSelectable::detached(),
            component_revision,
        }
    }

    /// A new entity with a copy of this entity's spawnargs. Observers,
    /// selection and namespace membership are not copied.
    #[must_use]
    pub fn clone_node(&self, context: &EntityContext) -> Self {
        Self::new(SpawnArgs::copy_of(&self.spawn_args), context)
    }

    #[inline]
    #[must_use]
    pub fn spawn_args(&self) -> &Rc<SpawnArgs> {
        &self.spawn_args
    }

    /// Calls `callback` with the current value of `key` and on every change
    /// until the subscription is dropped.
    #[must_use = "dropping the subscription stops the observation"]
    pub fn observe_key(&self, key: &str, callback: impl Fn(&str) + 'static) -> KeySubscription {
        self.key_observers.observe_key(key, callback)
    }

    #[inline]
    #[must_use]
    pub fn name_tracker(&self) -> &Rc<NameTracker> {
        &self.name_tracker
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name_tracker.name()
    }

    #[inline]
    #[must_use]
    pub fn target_keys(&self) -> &Rc<TargetKeyCollection> {
        &self.target_keys
    }

    #[must_use]
    pub fn classname(&self) -> String {
        self.spawn_args.classname()
    }

    /// `_color`, falling back to the class colour.
    #[must_use]
    pub fn colour(&self) -> DVec3 {
        self.colour.get()
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        self.spawn_args.is_container()
    }

    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.spawn_args.fingerprint()
    }

    #[inline]
    #[must_use]
    pub fn selectable(&self) -> &Rc<ObservedSelectable> {
        &self.selectable
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selectable.is_selected()
    }

    pub fn set_selected(&self, selected: bool) {
        self.selectable.set_selected(selected);
    }

    /// Increases with every change of a component selection.
    #[must_use]
    pub fn component_revision(&self) -> u64 {
        self.component_revision.get()
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    #[must_use]
    pub fn local_to_parent(&self) -> DAffine3 {
        self.kind.geometry().local_to_parent()
    }

    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        self.kind.geometry().local_aabb()
    }

    #[must_use]
    pub fn test_select(&self, test: &dyn SelectionTest, local_to_world: &DAffine3) -> Option<SelectionIntersection> {
        self.kind.geometry().test_select(test, local_to_world)
    }

    pub fn render_wireframe(&self, collector: &mut dyn RenderableCollector, volume: &dyn VolumeTest, local_to_world: &DAffine3) {
        if self.is_visible(volume, local_to_world) {
            self.kind
                .geometry()
                .render_wireframe(collector, local_to_world, self.colour());
        }
    }

    pub fn render_solid(&self, collector: &mut dyn RenderableCollector, volume: &dyn VolumeTest, local_to_world: &DAffine3) {
        if self.is_visible(volume, local_to_world) {
            self.kind
                .geometry()
                .render_solid(collector, local_to_world, self.colour());
        }
    }

    fn is_visible(&self, volume: &dyn VolumeTest, local_to_world: &DAffine3) -> bool {
        let aabb = self.local_aabb();
        !aabb.is_valid() || volume.test_aabb(&aabb.transformed(local_to_world))
    }
}

impl Drop for EntityNode {
    fn drop(&mut self) {
        self.subscriptions.clear();
        for id in self.observer_ids {
            self.spawn_args.detach_observer(id);
        }
    }
}

impl fmt::Debug for EntityNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityNode")
            .field("kind", &self.kind.name())
            .field("classname", &self.classname())
            .field("name", &self.name())
            .field("observers", &self.key_observers.len())
            .finish_non_exhaustive()
    }
}
