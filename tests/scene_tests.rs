//! Scene Graph Integration Tests
//!
//! Tests for:
//! - Building and editing the node hierarchy
//! - Hierarchy errors (cycles, root, non-containers, stale handles)
//! - Clone and paste of subtrees
//! - World bounds
//! - Render submission and culling
//! - The chainable `SceneEntity` wrapper

use glam::{DQuat, DVec3};
use mapcore::math::{Aabb, parse_vec3};
use mapcore::render::{BoxVolume, InfiniteVolume, RenderBuffer, shaders};
use mapcore::{EntityClassRegistry, MapError, MapRoot, NodeHandle};

fn new_map() -> MapRoot {
    MapRoot::new(EntityClassRegistry::with_builtin_classes())
}

/// A func_static container holding one cube primitive of half size 32.
fn map_with_mover() -> (MapRoot, NodeHandle, NodeHandle) {
    let mut map = new_map();
    let mover = map.add_entity("func_static").unwrap();
    map.set_key_value(mover, "name", "mover").unwrap();
    let brush = map
        .add_primitive(mover, vec![DVec3::splat(-32.0), DVec3::splat(32.0)])
        .unwrap();
    (map, mover, brush)
}

// ============================================================================
// Hierarchy
// ============================================================================

#[test]
fn new_map_holds_only_the_root() {
    let map = new_map();
    assert_eq!(map.node_count(), 1);
    assert!(map.children(map.root()).unwrap().is_empty());
    assert_eq!(map.parent(map.root()).unwrap(), None);
}

#[test]
fn entities_and_primitives_hang_below_their_parent() -> anyhow::Result<()> {
    let (map, mover, brush) = map_with_mover();

    assert_eq!(map.children(map.root())?, [mover]);
    assert_eq!(map.parent(brush)?, Some(mover));
    assert_eq!(map.descendants(map.root())?, vec![mover, brush]);
    assert_eq!(map.find_entity("mover"), Some(mover));
    Ok(())
}

#[test]
fn worldspawn_is_created_once() -> anyhow::Result<()> {
    let mut map = new_map();
    let first = map.find_or_insert_worldspawn()?;
    let second = map.find_or_insert_worldspawn()?;
    assert_eq!(first, second);
    assert_eq!(map.children(map.root())?.len(), 1);
    Ok(())
}

#[test]
fn attach_moves_subtree_between_parents() -> anyhow::Result<()> {
    let (mut map, mover, brush) = map_with_mover();
    let other = map.add_entity("func_static")?;

    map.attach(other, brush)?;

    assert!(map.children(mover)?.is_empty());
    assert_eq!(map.children(other)?, [brush]);
    assert_eq!(map.parent(brush)?, Some(other));
    Ok(())
}

#[test]
fn removal_outside_an_operation_frees_the_subtree() -> anyhow::Result<()> {
    let (mut map, mover, brush) = map_with_mover();

    map.remove_node(mover)?;

    assert!(!map.contains(mover));
    assert!(!map.contains(brush));
    assert_eq!(map.node_count(), 1);
    assert_eq!(map.find_entity("mover"), None);
    Ok(())
}

#[test]
fn removal_inside_an_operation_keeps_the_subtree() -> anyhow::Result<()> {
    let (mut map, mover, brush) = map_with_mover();

    map.undo_system_mut().start();
    map.remove_node(mover)?;
    map.undo_system_mut().finish("deleteSelected");

    assert!(map.contains(mover));
    assert_eq!(map.parent(brush)?, Some(mover));
    assert_eq!(map.parent(mover)?, None);
    assert_eq!(map.find_entity("mover"), None);
    Ok(())
}

// ============================================================================
// Hierarchy Errors
// ============================================================================

#[test]
fn attaching_below_own_descendant_is_refused() -> anyhow::Result<()> {
    let (mut map, mover, _) = map_with_mover();
    let inner = map.create_entity("func_static")?;
    map.attach(mover, inner)?;

    let result = map.attach(inner, mover);

    assert_eq!(result, Err(MapError::CyclicAttach { parent: inner, child: mover }));
    assert_eq!(map.parent(mover)?, Some(map.root()));
    Ok(())
}

#[test]
fn root_cannot_be_removed_or_cloned() {
    let mut map = new_map();
    let root = map.root();
    assert_eq!(map.remove_node(root), Err(MapError::RootNode));
    assert_eq!(map.clone_subgraph(root), Err(MapError::RootNode));
}

#[test]
fn point_entities_cannot_hold_children() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    let result = map.add_primitive(lamp, vec![DVec3::ZERO]);
    assert_eq!(result, Err(MapError::NotAContainer(lamp)));
    assert_eq!(map.node_count(), 2);
    Ok(())
}

#[test]
fn stale_handles_are_reported() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    map.remove_node(lamp)?;

    assert_eq!(map.entity(lamp).err(), Some(MapError::InvalidNode(lamp)));
    assert_eq!(map.set_key_value(lamp, "origin", "0 0 0"), Err(MapError::InvalidNode(lamp)));
    Ok(())
}

#[test]
fn primitives_are_not_entities() -> anyhow::Result<()> {
    let (map, _, brush) = map_with_mover();
    assert_eq!(map.entity(brush).err(), Some(MapError::NotAnEntity(brush)));
    Ok(())
}

// ============================================================================
// Clone And Paste
// ============================================================================

#[test]
fn clone_copies_subtree_detached() -> anyhow::Result<()> {
    let (mut map, mover, _) = map_with_mover();

    let clone = map.clone_subgraph(mover)?;

    assert_ne!(clone, mover);
    assert_eq!(map.parent(clone)?, None);
    assert_eq!(map.descendants(clone)?.len(), 1);
    assert_eq!(map.spawn_args(clone)?.get_key_value("name"), "mover");
    assert_eq!(map.find_entity("mover"), Some(mover));
    Ok(())
}

#[test]
fn clone_does_not_share_spawnargs() -> anyhow::Result<()> {
    let (mut map, mover, _) = map_with_mover();
    let clone = map.clone_subgraph(mover)?;

    map.set_key_value(clone, "origin", "64 0 0")?;

    assert_eq!(map.spawn_args(mover)?.get_key_value("origin"), "");
    Ok(())
}

#[test]
fn unpasted_clones_are_purged() -> anyhow::Result<()> {
    let (mut map, mover, _) = map_with_mover();
    let before = map.node_count();
    let clone = map.clone_subgraph(mover)?;
    assert_eq!(map.node_count(), before + 2);

    assert_eq!(map.purge_detached(), 2);
    assert!(!map.contains(clone));
    assert_eq!(map.node_count(), before);
    Ok(())
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn world_bounds_cover_children() -> anyhow::Result<()> {
    let (map, mover, brush) = map_with_mover();

    let expected = Aabb::new(DVec3::ZERO, DVec3::splat(32.0));
    assert_eq!(map.world_aabb(mover)?, expected);
    assert_eq!(map.world_aabb(brush)?, expected);
    Ok(())
}

#[test]
fn world_bounds_follow_origin() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "origin", "100 0 0")?;

    let aabb = map.world_aabb(player)?;
    assert_eq!(aabb.origin, DVec3::new(100.0, 0.0, 37.0));
    assert_eq!(aabb.extents, DVec3::new(16.0, 16.0, 37.0));
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn light_submits_its_volume() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    let mut buffer = RenderBuffer::new();

    map.render_wireframe(lamp, &mut buffer, &InfiniteVolume)?;

    assert_eq!(buffer.with_shader(shaders::LIGHT_VOLUME).count(), 1);
    assert_eq!(buffer.with_shader("<0 1 0>").count(), 1);
    Ok(())
}

#[test]
fn nodes_outside_the_volume_are_culled() -> anyhow::Result<()> {
    let (map, _, _) = map_with_mover();
    let far_away = BoxVolume(Aabb::new(DVec3::splat(10_000.0), DVec3::splat(16.0)));
    let mut buffer = RenderBuffer::new();

    map.render_solid(map.root(), &mut buffer, &far_away)?;
    assert!(buffer.is_empty());

    map.render_solid(map.root(), &mut buffer, &InfiniteVolume)?;
    assert!(!buffer.is_empty());
    Ok(())
}

#[test]
fn target_lines_are_rendered_with_their_entity() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "origin", "100 0 0")?;
    map.connect_entities(player, lamp)?;

    let mut buffer = RenderBuffer::new();
    map.render_wireframe(map.root(), &mut buffer, &InfiniteVolume)?;

    let lines: Vec<_> = buffer.with_shader(shaders::TARGET_LINE).collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0].vertices,
        vec![DVec3::new(0.0, 0.0, 37.0), DVec3::new(100.0, 0.0, 0.0)]
    );
    Ok(())
}

// ============================================================================
// SceneEntity
// ============================================================================

#[test]
fn scene_entity_chains_edits() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;

    map.scene_entity(lamp)
        .set_origin(DVec3::new(0.0, 0.0, 64.0))
        .set_key_value("light_radius", "200 200 200")
        .set_name("lamp")
        .translate(DVec3::new(16.0, 0.0, 0.0));

    let entity = map.scene_entity(lamp);
    assert!(entity.is_valid());
    assert_eq!(entity.key_value("origin"), "16 0 64");
    assert_eq!(entity.key_value("light_radius"), "200 200 200");
    assert_eq!(map.find_entity("lamp"), Some(lamp));
    assert_eq!(map.undo_system().undo_len(), 4);
    Ok(())
}

#[test]
fn scene_entity_rotates_about_its_centre() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;

    map.scene_entity(player)
        .set_origin(DVec3::new(64.0, 0.0, 0.0))
        .rotate(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));

    let entity = map.scene_entity(player);
    assert_eq!(entity.key_value("angle"), "90");
    let origin = parse_vec3(&entity.key_value("origin")).unwrap();
    assert!(origin.abs_diff_eq(DVec3::new(64.0, 0.0, 0.0), 1e-9));
    Ok(())
}

#[test]
fn scene_entity_ignores_stale_handles() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    map.remove_node(lamp)?;

    let entity = map.scene_entity(lamp).set_key_value("origin", "1 2 3").snap_to(8.0);
    assert!(!entity.is_valid());
    assert_eq!(entity.key_value("origin"), "");
    Ok(())
}
