//! The map root: node arena plus the per-map services.
//!
//! A [`MapRoot`] is one open document. It owns every node of the map in a
//! slotmap arena and the services that used to be process-wide: the entity
//! class registry, the namespace, the target registry and the undo stacks.
//! Several maps can be open side by side without sharing any state.
//!
//! # Scene membership
//!
//! Nodes reachable from the root node are *in the scene*. Entering the
//! scene connects an entity's names to the namespace, registers it as a
//! target and routes its snapshots to the undo system; leaving the scene
//! undoes all three. Detached nodes stay in the arena while an undo step
//! may bring them back.

use std::rc::Rc;

use glam::{DAffine3, DQuat, DVec3};
use slotmap::SlotMap;

use super::NodeHandle;
use super::node::{Node, NodeKind};
use super::primitive::Primitive;
use super::wrapper::SceneEntity;
use crate::curve::CurveNode;
use crate::entity::{EntityClass, EntityClassRegistry, EntityContext, EntityKind, EntityNode, SpawnArgs};
use crate::errors::{MapError, Result};
use crate::math::{Aabb, Plane3};
use crate::namespace::Namespace;
use crate::render::{PrimitiveType, RenderGeometry, RenderableCollector, ShaderHandle, VolumeTest, shaders};
use crate::selection::{ComponentEditable, ComponentMode, SelectionTest, Selector};
use crate::settings::EntitySettings;
use crate::sound::SoundManager;
use crate::target::TargetManager;
use crate::transform::{
    ComponentSnappable, Snappable, TransformContext, TransformDelta, Transformable, Translatable,
};
use crate::undo::{UndoMemento, UndoOperation, UndoSnapshot, UndoSystem, UndoTarget};

const TARGET_LINE_COLOUR: DVec3 = DVec3::new(1.0, 0.0, 0.0);

/// One open map.
#[derive(Debug)]
pub struct MapRoot {
    nodes: SlotMap<NodeHandle, Node>,
    root: NodeHandle,
    entity_classes: EntityClassRegistry,
    context: EntityContext,
    settings: EntitySettings,
    namespace: Rc<Namespace>,
    targets: Rc<TargetManager>,
    undo: UndoSystem,
}

impl MapRoot {
    #[must_use]
    pub fn new(entity_classes: EntityClassRegistry) -> Self {
        Self::with_settings(entity_classes, EntitySettings::default())
    }

    #[must_use]
    pub fn with_settings(entity_classes: EntityClassRegistry, settings: EntitySettings) -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root_node = Node::new(NodeKind::Root);
        root_node.in_scene = true;
        let root = nodes.insert(root_node);

        Self {
            nodes,
            root,
            entity_classes,
            context: EntityContext::from_settings(&settings),
            undo: UndoSystem::new(settings.undo_levels),
            settings,
            namespace: Namespace::new(),
            targets: Rc::new(TargetManager::new()),
        }
    }

    /// Speakers created from now on read their default radii from
    /// `sound_manager`.
    pub fn set_sound_manager(&mut self, sound_manager: Rc<dyn SoundManager>) {
        self.context = self.context.clone().with_sound_manager(sound_manager);
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// The root node. It cannot be removed, cloned or attached elsewhere.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EntitySettings {
        &self.settings
    }

    /// Replaces the settings. Curve density applies to entities created
    /// afterwards.
    pub fn set_settings(&mut self, settings: EntitySettings) {
        self.undo.set_levels(settings.undo_levels);
        self.context.curve_subdivisions = settings.curve_subdivisions;
        self.settings = settings;
    }

    #[inline]
    #[must_use]
    pub fn entity_classes(&self) -> &EntityClassRegistry {
        &self.entity_classes
    }

    #[inline]
    pub fn entity_classes_mut(&mut self) -> &mut EntityClassRegistry {
        &mut self.entity_classes
    }

    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &Rc<Namespace> {
        &self.namespace
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &Rc<TargetManager> {
        &self.targets
    }

    #[inline]
    #[must_use]
    pub fn undo_system(&self) -> &UndoSystem {
        &self.undo
    }

    #[inline]
    pub fn undo_system_mut(&mut self) -> &mut UndoSystem {
        &mut self.undo
    }

    // ========================================================================
    // Node access
    // ========================================================================

    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    /// Number of nodes in the arena, detached ones and the root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, handle: NodeHandle) -> Result<&Node> {
        self.nodes.get(handle).ok_or(MapError::InvalidNode(handle))
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.nodes.get_mut(handle).ok_or(MapError::InvalidNode(handle))
    }

    pub fn entity(&self, handle: NodeHandle) -> Result<&EntityNode> {
        self.node(handle)?.entity().ok_or(MapError::NotAnEntity(handle))
    }

    pub fn entity_mut(&mut self, handle: NodeHandle) -> Result<&mut EntityNode> {
        self.node_mut(handle)?
            .entity_mut()
            .ok_or(MapError::NotAnEntity(handle))
    }

    pub fn spawn_args(&self, handle: NodeHandle) -> Result<&Rc<SpawnArgs>> {
        Ok(self.entity(handle)?.spawn_args())
    }

    /// Chainable editing of one entity; see [`SceneEntity`].
    pub fn scene_entity(&mut self, handle: NodeHandle) -> SceneEntity<'_> {
        SceneEntity::new(self, handle)
    }

    /// The entity in the scene carrying `name`.
    #[must_use]
    pub fn find_entity(&self, name: &str) -> Option<NodeHandle> {
        self.targets
            .resolve(name)
            .filter(|&handle| self.nodes.get(handle).is_some_and(Node::is_in_scene))
    }

    /// The first worldspawn below the root, created if there is none.
    pub fn find_or_insert_worldspawn(&mut self) -> Result<NodeHandle> {
        let existing = self.nodes[self.root].children.iter().copied().find(|&child| {
            self.nodes
                .get(child)
                .and_then(Node::entity)
                .is_some_and(|entity| entity.spawn_args().is_worldspawn())
        });
        match existing {
            Some(worldspawn) => Ok(worldspawn),
            None => self.add_entity("worldspawn"),
        }
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    pub fn parent(&self, handle: NodeHandle) -> Result<Option<NodeHandle>> {
        Ok(self.node(handle)?.parent)
    }

    pub fn children(&self, handle: NodeHandle) -> Result<&[NodeHandle]> {
        Ok(self.node(handle)?.children())
    }

    /// Every node below `handle`, depth first, parents before children.
    pub fn descendants(&self, handle: NodeHandle) -> Result<Vec<NodeHandle>> {
        self.node(handle)?;
        let mut subtree = self.subtree(handle);
        subtree.remove(0);
        Ok(subtree)
    }

    /// A detached entity of class `classname` with the `classname` key set.
    pub fn create_entity(&mut self, classname: &str) -> Result<NodeHandle> {
        let eclass = self
            .entity_classes
            .find(classname)
            .ok_or_else(|| MapError::EntityClassNotFound(classname.to_owned()))?;
        Ok(self.insert_entity(eclass))
    }

    /// A new entity of class `classname` below the root node.
    pub fn add_entity(&mut self, classname: &str) -> Result<NodeHandle> {
        let handle = self.create_entity(classname)?;
        self.attach(self.root, handle)?;
        Ok(handle)
    }

    /// Adds an entity read from map data below the root node. Class names
    /// without a definition get a default brush-entity class, so the entity
    /// and its key/values survive the load.
    pub fn add_loaded_entity(&mut self, classname: &str) -> Result<NodeHandle> {
        let eclass = self.entity_classes.find_or_create_default(classname);
        let handle = self.insert_entity(eclass);
        self.attach(self.root, handle)?;
        Ok(handle)
    }

    fn insert_entity(&mut self, eclass: Rc<EntityClass>) -> NodeHandle {
        let entity = self.context.create_entity(eclass);
        self.nodes.insert(Node::new(NodeKind::Entity(entity)))
    }

    /// A new primitive made of `points` below `parent`.
    pub fn add_primitive(&mut self, parent: NodeHandle, points: Vec<DVec3>) -> Result<NodeHandle> {
        if !self.node(parent)?.can_hold_children() {
            return Err(MapError::NotAContainer(parent));
        }
        let handle = self.nodes.insert(Node::new(NodeKind::Primitive(Primitive::new(points))));
        if let Err(error) = self.attach(parent, handle) {
            self.nodes.remove(handle);
            return Err(error);
        }
        Ok(handle)
    }

    /// Moves `child` (with its subtree) below `parent`. Both child lists are
    /// recorded for undo.
    pub fn attach(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        self.check_attach(parent, child)?;
        let old_parent = self.nodes[child].parent;
        if old_parent == Some(parent) {
            return Ok(());
        }

        if let Some(old_parent) = old_parent {
            self.save_children(old_parent);
            if let Some(node) = self.nodes.get_mut(old_parent) {
                node.children.retain(|&existing| existing != child);
            }
        }

        self.save_children(parent);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);

        let parent_in_scene = self.nodes[parent].in_scene;
        let child_in_scene = self.nodes[child].in_scene;
        if parent_in_scene && !child_in_scene {
            self.connect_subtree(child);
        } else if !parent_in_scene && child_in_scene {
            self.disconnect_subtree(child);
        }
        Ok(())
    }

    /// Detaches `handle` from its parent. The subtree stays in the arena
    /// while an undo operation is recording, so it can be restored.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<()> {
        let node = self.node(handle)?;
        if node.is_root() {
            return Err(MapError::RootNode);
        }
        let Some(parent) = node.parent else {
            log::debug!("MapRoot: {handle:?} is already detached");
            return Ok(());
        };

        self.save_children(parent);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|&existing| existing != handle);
        }
        self.nodes[handle].parent = None;
        if self.nodes[handle].in_scene {
            self.disconnect_subtree(handle);
        }

        let referenced = self.undo.referenced_nodes().any(|referenced| referenced == handle);
        if !self.undo.is_operation_active() && !referenced {
            self.delete_subtree(handle);
        }
        Ok(())
    }

    /// A detached copy of the subtree at `handle`. Entities get fresh
    /// spawnargs with the same key/value strings; nothing else is shared.
    pub fn clone_subgraph(&mut self, handle: NodeHandle) -> Result<NodeHandle> {
        if self.node(handle)?.is_root() {
            return Err(MapError::RootNode);
        }

        let mut pending = vec![(handle, None)];
        let mut clone_root = None;
        while let Some((source, parent)) = pending.pop() {
            let kind = match self.nodes[source].kind() {
                NodeKind::Entity(entity) => NodeKind::Entity(entity.clone_node(&self.context)),
                NodeKind::Primitive(primitive) => NodeKind::Primitive(primitive.clone_primitive()),
                NodeKind::Root => continue,
            };
            let mut node = Node::new(kind);
            node.parent = parent;
            let cloned = self.nodes.insert(node);
            match parent {
                Some(parent) => self.nodes[parent].children.push(cloned),
                None => clone_root = Some(cloned),
            }
            // reversed so the clone keeps the child order
            for &child in self.nodes[source].children.iter().rev() {
                pending.push((child, Some(cloned)));
            }
        }
        clone_root.ok_or(MapError::InvalidNode(handle))
    }

    /// Inserts a subtree made by [`MapRoot::clone_subgraph`] below `parent`.
    ///
    /// Names inside the clone that are taken in this map are replaced by
    /// free ones first, and references between the cloned entities follow
    /// the renames.
    pub fn paste_subgraph(&mut self, clone: NodeHandle, parent: NodeHandle) -> Result<()> {
        self.check_attach(parent, clone)?;
        if !self.nodes[clone].in_scene {
            let trackers: Vec<_> = self
                .subtree(clone)
                .into_iter()
                .filter_map(|handle| self.nodes[handle].entity())
                .map(|entity| entity.name_tracker().clone())
                .collect();
            self.namespace.merge_cloned_names(&trackers);
        }
        self.undoable("paste", |map| map.attach(parent, clone))
    }

    /// Drops detached subtrees no undo step refers to. Pending clones that
    /// were never pasted are dropped as well.
    pub fn purge_detached(&mut self) -> usize {
        let referenced: Vec<NodeHandle> = self.undo.referenced_nodes().collect();
        let detached: Vec<NodeHandle> = self
            .nodes
            .iter()
            .filter(|(handle, node)| *handle != self.root && node.parent.is_none())
            .map(|(handle, _)| handle)
            .filter(|handle| !referenced.contains(handle))
            .collect();
        let before = self.nodes.len();
        for handle in detached {
            self.delete_subtree(handle);
        }
        before - self.nodes.len()
    }

    fn check_attach(&self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if child_node.is_root() {
            return Err(MapError::RootNode);
        }
        if parent == child || self.is_ancestor(child, parent) {
            log::warn!("MapRoot: cannot attach {child:?} below {parent:?}");
            return Err(MapError::CyclicAttach { parent, child });
        }
        if !parent_node.can_hold_children() {
            return Err(MapError::NotAContainer(parent));
        }
        Ok(())
    }

    /// True if `ancestor` is above `handle`.
    fn is_ancestor(&self, ancestor: NodeHandle, handle: NodeHandle) -> bool {
        let mut current = self.nodes.get(handle).and_then(|node| node.parent);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes.get(node).and_then(|node| node.parent);
        }
        false
    }

    fn subtree(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut result = Vec::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            result.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        result
    }

    fn delete_subtree(&mut self, handle: NodeHandle) {
        for node in self.subtree(handle) {
            self.nodes.remove(node);
        }
    }

    fn save_children(&self, handle: NodeHandle) {
        if let Some(node) = self.nodes.get(handle)
            && node.in_scene
        {
            self.undo.recorder().save(UndoTarget::Children(handle), || {
                UndoMemento::Children(node.children.clone())
            });
        }
    }

    fn connect_subtree(&mut self, handle: NodeHandle) {
        for current in self.subtree(handle) {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.in_scene = true;
            match node.kind() {
                NodeKind::Entity(entity) => {
                    let tracker = entity.name_tracker();
                    let name = tracker.name();
                    if !name.is_empty() && self.namespace.name_exists(&name) {
                        let unique = self.namespace.make_unique(&name);
                        log::info!("Entity name '{name}' is taken, using '{unique}'");
                        tracker.change_name(&unique);
                    }
                    tracker.connect(&self.namespace);
                    tracker.register_target(&self.targets, current);
                    entity.spawn_args().connect_undo(self.undo.recorder());
                }
                NodeKind::Primitive(primitive) => primitive.connect_undo(self.undo.recorder()),
                NodeKind::Root => {}
            }
        }
    }

    fn disconnect_subtree(&mut self, handle: NodeHandle) {
        for current in self.subtree(handle) {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.in_scene = false;
            match node.kind() {
                NodeKind::Entity(entity) => {
                    let tracker = entity.name_tracker();
                    tracker.unregister_target();
                    if tracker.is_connected() {
                        tracker.disconnect(&self.namespace);
                    }
                    entity.spawn_args().disconnect_undo();
                }
                NodeKind::Primitive(primitive) => primitive.disconnect_undo(),
                NodeKind::Root => {}
            }
        }
    }

    // ========================================================================
    // Spatial queries
    // ========================================================================

    /// World transform of the parent space of `handle`.
    pub fn parent_to_world(&self, handle: NodeHandle) -> Result<DAffine3> {
        let mut matrix = DAffine3::IDENTITY;
        let mut current = self.node(handle)?.parent;
        while let Some(parent) = current {
            let node = self.node(parent)?;
            matrix = node.local_to_parent() * matrix;
            current = node.parent;
        }
        Ok(matrix)
    }

    pub fn local_to_world(&self, handle: NodeHandle) -> Result<DAffine3> {
        Ok(self.parent_to_world(handle)? * self.node(handle)?.local_to_parent())
    }

    /// World bounds of the node and all its descendants.
    pub fn world_aabb(&self, handle: NodeHandle) -> Result<Aabb> {
        let mut aabb = Aabb::INVALID;
        let parent_to_world = self.parent_to_world(handle)?;
        let mut stack = vec![(handle, parent_to_world)];
        while let Some((current, parent_to_world)) = stack.pop() {
            let node = self.node(current)?;
            let local_to_world = parent_to_world * node.local_to_parent();
            let local = node.local_aabb();
            if local.is_valid() {
                aabb.include_aabb(&local.transformed(&local_to_world));
            }
            stack.extend(node.children.iter().map(|&child| (child, local_to_world)));
        }
        Ok(aabb)
    }

    // ========================================================================
    // Spawnargs
    // ========================================================================

    /// Sets a key inside its own undo step, or as part of the open one.
    pub fn set_key_value(&mut self, handle: NodeHandle, key: &str, value: &str) -> Result<()> {
        self.entity(handle)?;
        self.undoable("entitySetKeyValue", |map| {
            map.entity(handle)?.spawn_args().set_key_value(key, value);
            Ok(())
        })
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Previews `delta` on the node: revert, then evaluate. Containers hand
    /// the delta on to their children.
    pub fn set_transform(&mut self, handle: NodeHandle, delta: &TransformDelta) -> Result<()> {
        let targets = self.transform_targets(handle)?;
        for &(node, parent_to_world) in &targets {
            let context = TransformContext::new(&self.settings, parent_to_world);
            if let Some(transformable) = self.nodes.get_mut(node).and_then(Node::as_transformable_mut) {
                transformable.revert_transform();
                transformable.evaluate_transform(delta, &context);
            }
        }
        Ok(())
    }

    /// Commits the previewed transform to the spawnargs.
    pub fn freeze_transform(&mut self, handle: NodeHandle) -> Result<()> {
        self.for_each_transformable(handle, |transformable| transformable.freeze_transform())
    }

    /// Cancels the previewed transform.
    pub fn revert_transform(&mut self, handle: NodeHandle) -> Result<()> {
        self.for_each_transformable(handle, |transformable| transformable.revert_transform())
    }

    /// Revert, evaluate and freeze as one undo step.
    pub fn apply_transform(&mut self, handle: NodeHandle, delta: &TransformDelta) -> Result<()> {
        self.transform_targets(handle)?;
        let name = if delta.scale != DVec3::ONE {
            "scale"
        } else if delta.rotation != DQuat::IDENTITY {
            "rotate"
        } else {
            "translate"
        };
        self.undoable(name, |map| {
            map.set_transform(handle, delta)?;
            map.freeze_transform(handle)
        })
    }

    pub fn snap_to(&mut self, handle: NodeHandle, grid: f64) -> Result<()> {
        self.as_snappable(handle)?;
        self.undoable("snapToGrid", |map| {
            map.as_snappable(handle)?.snap_to(grid);
            Ok(())
        })
    }

    pub fn snap_components(&mut self, handle: NodeHandle, grid: f64) -> Result<()> {
        self.component_snappable(handle)?;
        self.undoable("snapComponentsToGrid", |map| {
            map.component_snappable(handle)?.snap_components(grid);
            Ok(())
        })
    }

    /// Moves the child primitives of a container by its origin. A
    /// container with a model has nothing to offset.
    pub fn add_origin_to_children(&mut self, handle: NodeHandle) -> Result<()> {
        self.offset_children(handle, 1.0)
    }

    /// Inverse of [`MapRoot::add_origin_to_children`].
    pub fn remove_origin_from_children(&mut self, handle: NodeHandle) -> Result<()> {
        self.offset_children(handle, -1.0)
    }

    fn offset_children(&mut self, handle: NodeHandle, sign: f64) -> Result<()> {
        let EntityKind::StaticGeometry(geometry) = self.entity(handle)?.kind() else {
            return Err(MapError::MissingCapability {
                node: handle,
                capability: "container origin",
            });
        };
        let Some(origin) = geometry.child_origin_offset() else {
            return Ok(());
        };
        let children = self.nodes[handle].children.clone();
        for child in children {
            if let Some(primitive) = self.nodes.get_mut(child).and_then(Node::primitive_mut) {
                primitive.translate(origin * sign);
            }
        }
        Ok(())
    }

    /// The node and, for containers, every transformable descendant the
    /// delta is forwarded to, with their parent-to-world transforms.
    fn transform_targets(&self, handle: NodeHandle) -> Result<Vec<(NodeHandle, DAffine3)>> {
        let node = self.node(handle)?;
        if node.as_transformable().is_none() {
            return Err(MapError::MissingCapability {
                node: handle,
                capability: "Transformable",
            });
        }

        let mut targets = Vec::new();
        let mut stack = vec![(handle, self.parent_to_world(handle)?)];
        while let Some((current, parent_to_world)) = stack.pop() {
            let node = self.node(current)?;
            let Some(transformable) = node.as_transformable() else {
                continue;
            };
            targets.push((current, parent_to_world));
            if transformable.forwards_to_children() {
                let local_to_world = parent_to_world * node.local_to_parent();
                stack.extend(node.children.iter().map(|&child| (child, local_to_world)));
            }
        }
        Ok(targets)
    }

    fn for_each_transformable(&mut self, handle: NodeHandle, mut apply: impl FnMut(&mut dyn Transformable)) -> Result<()> {
        for (node, _) in self.transform_targets(handle)? {
            if let Some(transformable) = self.nodes.get_mut(node).and_then(Node::as_transformable_mut) {
                apply(transformable);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    pub fn as_transformable(&self, handle: NodeHandle) -> Result<&dyn Transformable> {
        self.node(handle)?
            .as_transformable()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "Transformable",
            })
    }

    pub fn as_snappable(&mut self, handle: NodeHandle) -> Result<&mut dyn Snappable> {
        self.node_mut(handle)?
            .as_snappable_mut()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "Snappable",
            })
    }

    pub fn as_component_editable(&self, handle: NodeHandle) -> Result<&dyn ComponentEditable> {
        self.node(handle)?
            .as_component_editable()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "ComponentEditable",
            })
    }

    pub fn as_curve_node(&self, handle: NodeHandle) -> Result<&dyn CurveNode> {
        self.node(handle)?
            .as_curve_node()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "CurveNode",
            })
    }

    fn component_snappable(&mut self, handle: NodeHandle) -> Result<&mut dyn ComponentSnappable> {
        self.node_mut(handle)?
            .as_component_snappable_mut()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "ComponentSnappable",
            })
    }

    // ========================================================================
    // Curves
    // ========================================================================

    pub fn convert_curve_type(&mut self, handle: NodeHandle) -> Result<()> {
        self.as_curve_node(handle)?;
        self.undoable("curveConvertType", |map| {
            map.as_curve_node(handle)?.convert_curve_type();
            Ok(())
        })
    }

    pub fn append_curve_control_points(&mut self, handle: NodeHandle, count: usize) -> Result<()> {
        self.as_curve_node(handle)?;
        self.undoable("curveAppendControlPoints", |map| {
            map.as_curve_node(handle)?.append_control_points(count);
            Ok(())
        })
    }

    pub fn remove_selected_curve_control_points(&mut self, handle: NodeHandle) -> Result<()> {
        self.as_curve_node(handle)?;
        self.undoable("curveRemoveControlPoints", |map| {
            map.as_curve_node(handle)?.remove_selected_control_points();
            Ok(())
        })
    }

    pub fn insert_curve_control_points(&mut self, handle: NodeHandle) -> Result<()> {
        self.as_curve_node(handle)?;
        self.undoable("curveInsertControlPoints", |map| {
            map.as_curve_node(handle)?.insert_control_points_at_selected();
            Ok(())
        })
    }

    // ========================================================================
    // Targets
    // ========================================================================

    /// Points the next free `targetN` key of `source` at `target`. An
    /// unnamed target gets a unique name first.
    pub fn connect_entities(&mut self, source: NodeHandle, target: NodeHandle) -> Result<()> {
        self.entity(source)?;
        self.entity(target)?;
        if source == target {
            log::error!("Cannot connect an entity to itself");
            return Ok(());
        }

        self.undoable("entityConnectSelected", |map| {
            let target_entity = map.entity(target)?;
            let mut name = target_entity.name();
            if name.is_empty() {
                name = map.namespace.make_unique(&target_entity.classname());
                target_entity.name_tracker().change_name(&name);
                // a connected tracker may have picked another free name
                name = target_entity.name();
            }

            let source_entity = map.entity(source)?;
            let key = source_entity.target_keys().next_free_key();
            log::debug!("Connecting '{}' to '{name}' via {key}", source_entity.name());
            source_entity.spawn_args().set_key_value(&key, &name);
            Ok(())
        })
    }

    /// World space lines from `handle` to every entity it targets. Names
    /// nobody carries produce no line.
    pub fn target_lines(&self, handle: NodeHandle) -> Result<Vec<(DVec3, DVec3)>> {
        let entity = self.entity(handle)?;
        let start = self
            .local_to_world(handle)?
            .transform_point3(self.nodes[handle].local_target_point());

        let mut lines = Vec::new();
        for (_, name) in entity.target_keys().targets() {
            let Some(target) = self.find_entity(&name) else {
                continue;
            };
            let end = self
                .local_to_world(target)?
                .transform_point3(self.nodes[target].local_target_point());
            lines.push((start, end));
        }
        Ok(lines)
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Tests every node in the scene and reports hits to `selector`.
    pub fn test_select(&self, test: &dyn SelectionTest, selector: &mut dyn Selector) {
        for handle in self.subtree(self.root) {
            let Ok(local_to_world) = self.local_to_world(handle) else {
                continue;
            };
            let node = &self.nodes[handle];
            let hit = match node.kind() {
                NodeKind::Root => None,
                NodeKind::Entity(entity) => entity
                    .test_select(test, &local_to_world)
                    .map(|hit| (entity.selectable(), hit)),
                NodeKind::Primitive(primitive) => primitive
                    .test_select(test, &local_to_world)
                    .map(|hit| (primitive.selectable(), hit)),
            };
            if let Some((selectable, intersection)) = hit {
                selector.add_intersection(selectable, intersection);
            }
        }
    }

    pub fn test_select_components(
        &self,
        handle: NodeHandle,
        test: &dyn SelectionTest,
        selector: &mut dyn Selector,
        mode: ComponentMode,
    ) -> Result<()> {
        let local_to_world = self.local_to_world(handle)?;
        self.as_component_editable(handle)?
            .test_select_components(selector, test, &local_to_world, mode);
        Ok(())
    }

    /// Selects the drag planes of a light or speaker facing the test ray and
    /// returns the planes that were hit, in world space.
    pub fn select_planes(
        &mut self,
        handle: NodeHandle,
        test: &dyn SelectionTest,
        selector: &mut dyn Selector,
    ) -> Result<Vec<Plane3>> {
        let local_to_world = self.local_to_world(handle)?;
        let selectable = self
            .node_mut(handle)?
            .as_plane_selectable_mut()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "PlaneSelectable",
            })?;
        let mut planes = Vec::new();
        selectable.select_planes(selector, test, &local_to_world, &mut |plane: &Plane3| {
            planes.push(plane.transformed(&local_to_world));
        });
        Ok(planes)
    }

    /// Selects the drag planes of `handle` lying against one of
    /// `selected_planes` (world space) from the other side.
    pub fn select_reversed_planes(
        &mut self,
        handle: NodeHandle,
        selector: &mut dyn Selector,
        selected_planes: &[Plane3],
    ) -> Result<()> {
        let world_to_local = self.local_to_world(handle)?.inverse();
        let selected_planes: Vec<Plane3> = selected_planes
            .iter()
            .map(|plane| plane.transformed(&world_to_local))
            .collect();
        self.node_mut(handle)?
            .as_plane_selectable_mut()
            .ok_or(MapError::MissingCapability {
                node: handle,
                capability: "PlaneSelectable",
            })?
            .select_reversed_planes(selector, &selected_planes);
        Ok(())
    }

    pub fn set_selected(&self, handle: NodeHandle, selected: bool) -> Result<()> {
        if let Some(selectable) = self.node(handle)?.selectable() {
            selectable.set_selected(selected);
        }
        Ok(())
    }

    /// Nodes in the scene whose whole-object selection is set.
    #[must_use]
    pub fn selected_nodes(&self) -> Vec<NodeHandle> {
        self.subtree(self.root)
            .into_iter()
            .filter(|&handle| {
                self.nodes[handle]
                    .selectable()
                    .is_some_and(|selectable| selectable.is_selected())
            })
            .collect()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Submits the wireframe geometry of the node and its descendants.
    pub fn render_wireframe(
        &self,
        handle: NodeHandle,
        collector: &mut dyn RenderableCollector,
        volume: &dyn VolumeTest,
    ) -> Result<()> {
        self.render(handle, collector, volume, false)
    }

    /// Submits the solid geometry of the node and its descendants.
    pub fn render_solid(
        &self,
        handle: NodeHandle,
        collector: &mut dyn RenderableCollector,
        volume: &dyn VolumeTest,
    ) -> Result<()> {
        self.render(handle, collector, volume, true)
    }

    fn render(
        &self,
        handle: NodeHandle,
        collector: &mut dyn RenderableCollector,
        volume: &dyn VolumeTest,
        solid: bool,
    ) -> Result<()> {
        self.node(handle)?;
        for current in self.subtree(handle) {
            let local_to_world = self.local_to_world(current)?;
            match self.nodes[current].kind() {
                NodeKind::Root => {}
                NodeKind::Entity(entity) => {
                    if solid {
                        entity.render_solid(collector, volume, &local_to_world);
                    } else {
                        entity.render_wireframe(collector, volume, &local_to_world);
                    }
                    let lines = self.target_lines(current)?;
                    if !lines.is_empty() {
                        let vertices = lines.into_iter().flat_map(|(start, end)| [start, end]).collect();
                        collector.add_geometry(
                            &ShaderHandle::named(shaders::TARGET_LINE),
                            RenderGeometry::new(PrimitiveType::Lines, vertices, TARGET_LINE_COLOUR),
                        );
                    }
                }
                NodeKind::Primitive(primitive) => {
                    if !volume.test_aabb(&primitive.bounds().transformed(&local_to_world)) {
                        continue;
                    }
                    if solid {
                        primitive.render_solid(collector, &local_to_world);
                    } else {
                        primitive.render_wireframe(collector, &local_to_world);
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Undo
    // ========================================================================

    /// Runs `edit` inside its own undo step named `name`, or inside the
    /// open one if there is one.
    fn undoable<T>(&mut self, name: &str, edit: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let owns_operation = !self.undo.is_operation_active();
        if owns_operation {
            self.undo.start();
        }
        let result = edit(self);
        if owns_operation {
            match result {
                Ok(_) => self.undo.finish(name),
                Err(_) => self.undo.cancel(),
            }
        }
        result
    }

    /// Restores the state before the most recent operation. Returns false if
    /// there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.undo.is_operation_active() {
            log::warn!("Undo: cannot undo while an operation is in progress");
            return false;
        }
        let Some(operation) = self.undo.pop_undo() else {
            log::warn!("Undo: no undoable command");
            return false;
        };
        log::debug!("Undo: {}", operation.name);
        let inverse = self.restore(&operation);
        self.undo.push_redo(inverse);
        true
    }

    /// Re-applies the most recently undone operation.
    pub fn redo(&mut self) -> bool {
        if self.undo.is_operation_active() {
            log::warn!("Redo: cannot redo while an operation is in progress");
            return false;
        }
        let Some(operation) = self.undo.pop_redo() else {
            log::warn!("Redo: no redoable command");
            return false;
        };
        log::debug!("Redo: {}", operation.name);
        let inverse = self.restore(&operation);
        self.undo.push_undo(inverse);
        true
    }

    /// Imports every snapshot of `operation`, returning an operation that
    /// captures the state it replaced.
    fn restore(&mut self, operation: &UndoOperation) -> UndoOperation {
        let snapshots = operation
            .snapshots
            .iter()
            .filter_map(|snapshot| {
                self.export_target(&snapshot.target).map(|memento| UndoSnapshot {
                    target: snapshot.target.clone(),
                    memento,
                })
            })
            .collect();

        for snapshot in operation.snapshots.iter().rev() {
            match (&snapshot.target, &snapshot.memento) {
                (UndoTarget::Object(object), memento) => match object.upgrade() {
                    Some(object) => object.import_state(memento),
                    None => log::debug!("Undo: snapshot target no longer exists"),
                },
                (UndoTarget::Children(handle), UndoMemento::Children(children)) => {
                    self.restore_children(*handle, children);
                }
                (UndoTarget::Children(handle), _) => {
                    log::error!("Undo: malformed child list snapshot for {handle:?}");
                }
            }
        }

        UndoOperation {
            name: operation.name.clone(),
            snapshots,
        }
    }

    fn export_target(&self, target: &UndoTarget) -> Option<UndoMemento> {
        match target {
            UndoTarget::Object(object) => object.upgrade().map(|object| object.export_state()),
            UndoTarget::Children(handle) => self
                .nodes
                .get(*handle)
                .map(|node| UndoMemento::Children(node.children.clone())),
        }
    }

    /// Sets the child list of `handle` to `saved`, connecting subtrees that
    /// come back and disconnecting those that leave.
    fn restore_children(&mut self, handle: NodeHandle, saved: &[NodeHandle]) {
        let Some(node) = self.nodes.get(handle) else {
            log::warn!("Undo: node {handle:?} no longer exists");
            return;
        };
        let current = node.children.clone();
        let in_scene = node.in_scene;

        for &child in current.iter().filter(|child| !saved.contains(child)) {
            let owned = self.nodes.get(child).is_some_and(|node| node.parent == Some(handle));
            if owned {
                self.nodes[child].parent = None;
                if self.nodes[child].in_scene {
                    self.disconnect_subtree(child);
                }
            }
        }

        let mut restored = Vec::with_capacity(saved.len());
        for &child in saved {
            let Some(node) = self.nodes.get(child) else {
                log::warn!("Undo: child {child:?} no longer exists");
                continue;
            };
            if let Some(other) = node.parent
                && other != handle
                && let Some(other_node) = self.nodes.get_mut(other)
            {
                other_node.children.retain(|&existing| existing != child);
            }
            restored.push(child);
        }
        self.nodes[handle].children.clone_from(&restored);

        for child in restored {
            self.nodes[child].parent = Some(handle);
            let child_in_scene = self.nodes[child].in_scene;
            if in_scene && !child_in_scene {
                self.connect_subtree(child);
            } else if !in_scene && child_in_scene {
                self.disconnect_subtree(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> MapRoot {
        MapRoot::new(EntityClassRegistry::with_builtin_classes())
    }

    #[test]
    fn unknown_class_is_an_error() {
        let mut map = map();
        assert_eq!(
            map.add_entity("no_such_class"),
            Err(MapError::EntityClassNotFound("no_such_class".to_owned()))
        );
    }

    #[test]
    fn loaded_entities_of_unknown_class_get_a_default_class() {
        let mut map = map();
        let door = map.add_loaded_entity("func_door").expect("default class");

        assert_eq!(map.entity(door).expect("entity").kind().name(), "StaticGeometry");
        assert!(map.entity(door).expect("entity").is_container());
        assert!(map.entity_classes().find("func_door").is_some());
        assert!(map.add_entity("func_door").is_ok());

        let lamp = map.add_loaded_entity("light").expect("builtin class");
        assert_eq!(map.entity(lamp).expect("entity").kind().name(), "Light");
    }

    #[test]
    fn cyclic_attach_is_rejected() {
        let mut map = map();
        let outer = map.add_entity("func_static").expect("builtin class");
        let inner = map.add_entity("func_static").expect("builtin class");
        map.attach(outer, inner).expect("container accepts children");

        assert_eq!(
            map.attach(inner, outer),
            Err(MapError::CyclicAttach {
                parent: inner,
                child: outer
            })
        );
        assert_eq!(map.attach(outer, outer), Err(MapError::CyclicAttach { parent: outer, child: outer }));
        assert_eq!(map.attach(outer, map.root()), Err(MapError::RootNode));
    }

    #[test]
    fn point_entities_hold_no_children() {
        let mut map = map();
        let light = map.add_entity("light").expect("builtin class");
        assert_eq!(
            map.add_primitive(light, vec![DVec3::ZERO]),
            Err(MapError::NotAContainer(light))
        );
        assert_eq!(map.node_count(), 2);
    }

    #[test]
    fn removal_outside_undo_frees_the_nodes() {
        let mut map = map();
        let group = map.add_entity("func_static").expect("builtin class");
        map.add_primitive(group, vec![DVec3::ZERO]).expect("container accepts children");
        assert_eq!(map.node_count(), 3);

        map.remove_node(group).expect("live node");
        assert_eq!(map.node_count(), 1);
        assert!(!map.contains(group));
    }
}
