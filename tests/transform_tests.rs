//! Transform Integration Tests
//!
//! Tests for:
//! - Preview / revert / freeze cycle of every entity kind
//! - Container forwarding to child primitives
//! - Rotation write-back (angle vs. full matrix)
//! - Light drag-resize through selected drag planes
//! - Container origin offsets and grid snapping

use std::f64::consts::FRAC_PI_2;

use glam::{DMat3, DQuat, DVec3};
use mapcore::entity::{EntityKind, RotationMatrix};
use mapcore::math::{parse_float, parse_vec3};
use mapcore::selection::{ComponentMode, FaceMask, RaySelectionTest, SelectionPool};
use mapcore::{EntityClassRegistry, EntitySettings, MapError, MapRoot, NodeHandle, TransformDelta, TransformKind};

fn new_map() -> MapRoot {
    MapRoot::new(EntityClassRegistry::with_builtin_classes())
}

fn origin_of(map: &MapRoot, handle: NodeHandle) -> DVec3 {
    let value = map.spawn_args(handle).unwrap().get_key_value("origin");
    parse_vec3(&value).unwrap_or(DVec3::ZERO)
}

fn key(map: &MapRoot, handle: NodeHandle, key: &str) -> String {
    map.spawn_args(handle).unwrap().get_key_value(key)
}

fn quarter_turn() -> DQuat {
    DQuat::from_rotation_z(FRAC_PI_2)
}

// ============================================================================
// Preview / Revert / Freeze
// ============================================================================

#[test]
fn translation_round_trips_through_origin_key() -> anyhow::Result<()> {
    for classname in ["light", "speaker", "info_player_start", "item_medkit", "path_corner"] {
        let mut map = new_map();
        let entity = map.add_entity(classname)?;
        map.set_key_value(entity, "origin", "16 -8 4")?;

        map.apply_transform(entity, &TransformDelta::translation(DVec3::new(10.0, 20.0, -30.0)))?;

        assert_eq!(origin_of(&map, entity), DVec3::new(26.0, 12.0, -26.0), "{classname}");
    }
    Ok(())
}

#[test]
fn revert_is_idempotent_and_leaves_keys_untouched() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;
    map.set_key_value(light, "origin", "0 0 64")?;
    let committed = map.node(light)?.local_to_parent();

    map.set_transform(light, &TransformDelta::translation(DVec3::new(32.0, 0.0, 0.0)))?;
    assert_ne!(map.node(light)?.local_to_parent(), committed);

    map.revert_transform(light)?;
    let once = map.node(light)?.local_to_parent();
    map.revert_transform(light)?;

    assert_eq!(once, committed);
    assert_eq!(map.node(light)?.local_to_parent(), committed);
    assert_eq!(key(&map, light, "origin"), "0 0 64");
    Ok(())
}

#[test]
fn preview_replaces_rather_than_accumulates() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    let delta = TransformDelta::translation(DVec3::new(8.0, 0.0, 0.0));

    map.set_transform(player, &delta)?;
    map.set_transform(player, &delta)?;
    map.freeze_transform(player)?;

    assert_eq!(origin_of(&map, player), DVec3::new(8.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn root_is_not_transformable() {
    let mut map = new_map();
    let root = map.root();
    let result = map.apply_transform(root, &TransformDelta::translation(DVec3::X));
    assert!(matches!(result, Err(MapError::MissingCapability { .. })));
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn container_forwards_translation_to_children() -> anyhow::Result<()> {
    let mut map = new_map();
    let container = map.add_entity("func_static")?;
    let brush = map.add_primitive(container, vec![DVec3::ZERO, DVec3::splat(16.0)])?;

    map.apply_transform(container, &TransformDelta::translation(DVec3::new(8.0, 0.0, 0.0)))?;

    assert_eq!(key(&map, container, "origin"), "8 0 0");
    let points = map.node(brush)?.primitive().unwrap().points();
    assert_eq!(points, vec![DVec3::new(8.0, 0.0, 0.0), DVec3::new(24.0, 16.0, 16.0)]);
    Ok(())
}

#[test]
fn model_does_not_forward_to_children() -> anyhow::Result<()> {
    let mut map = new_map();
    let container = map.add_entity("func_static")?;
    let brush = map.add_primitive(container, vec![DVec3::ZERO])?;
    map.set_key_value(container, "model", "models/chair.lwo")?;

    map.apply_transform(container, &TransformDelta::translation(DVec3::Z))?;

    assert_eq!(map.node(brush)?.primitive().unwrap().points(), vec![DVec3::ZERO]);
    assert_eq!(key(&map, container, "origin"), "0 0 1");
    Ok(())
}

#[test]
fn origin_offsets_move_children_and_back() -> anyhow::Result<()> {
    let mut map = new_map();
    let container = map.add_entity("func_static")?;
    map.set_key_value(container, "origin", "64 0 0")?;
    let brush = map.add_primitive(container, vec![DVec3::ZERO, DVec3::X])?;

    map.add_origin_to_children(container)?;
    assert_eq!(
        map.node(brush)?.primitive().unwrap().points(),
        vec![DVec3::new(64.0, 0.0, 0.0), DVec3::new(65.0, 0.0, 0.0)]
    );

    map.remove_origin_from_children(container)?;
    assert_eq!(map.node(brush)?.primitive().unwrap().points(), vec![DVec3::ZERO, DVec3::X]);

    let light = map.add_entity("light")?;
    assert!(matches!(
        map.add_origin_to_children(light),
        Err(MapError::MissingCapability { .. })
    ));
    Ok(())
}

// ============================================================================
// Rotation Write-Back
// ============================================================================

#[test]
fn model_rotation_is_written_as_full_matrix() -> anyhow::Result<()> {
    let mut map = new_map();
    let model = map.add_entity("func_static")?;
    map.set_key_value(model, "model", "models/chair.lwo")?;

    map.apply_transform(model, &TransformDelta::rotation_about(DVec3::ZERO, quarter_turn()))?;

    assert_eq!(key(&map, model, "angle"), "");
    let written = RotationMatrix::parse(&key(&map, model, "rotation"));
    assert!(
        written
            .matrix()
            .abs_diff_eq(DMat3::from_rotation_z(FRAC_PI_2), 1e-6)
    );
    Ok(())
}

#[test]
fn point_entity_rotation_is_written_as_angle() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "origin", "16 0 0")?;

    map.apply_transform(player, &TransformDelta::rotation_about(DVec3::ZERO, quarter_turn()))?;

    assert_eq!(key(&map, player, "angle"), "90");
    assert!(origin_of(&map, player).abs_diff_eq(DVec3::new(0.0, 16.0, 0.0), 1e-9));
    Ok(())
}

#[test]
fn rotatable_entity_keeps_full_orientation() -> anyhow::Result<()> {
    let mut map = new_map();
    let corner = map.add_entity("path_corner")?;
    let tilt = DQuat::from_rotation_x(FRAC_PI_2);

    map.apply_transform(corner, &TransformDelta::rotation(tilt))?;

    let written = RotationMatrix::parse(&key(&map, corner, "rotation"));
    assert!(written.matrix().abs_diff_eq(DMat3::from_quat(tilt), 1e-6));
    Ok(())
}

#[test]
fn full_turn_of_point_entity_clears_angle() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "angle", "270")?;

    map.apply_transform(player, &TransformDelta::rotation(quarter_turn()))?;

    let angle = key(&map, player, "angle");
    assert!(angle.is_empty() || parse_float(&angle) == Some(0.0), "got {angle:?}");
    Ok(())
}

// ============================================================================
// Light Drag-Resize
// ============================================================================

fn grab_right_face(map: &mut MapRoot, light: NodeHandle) -> anyhow::Result<()> {
    let test = RaySelectionTest::new(DVec3::new(400.0, 0.0, 1000.0), DVec3::NEG_Z, 1.0);
    let mut pool = SelectionPool::new();
    let planes = map.select_planes(light, &test, &mut pool)?;
    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].normal, DVec3::X);
    pool.select_all();
    Ok(())
}

fn face_drag(translation: DVec3) -> TransformDelta {
    TransformDelta::translation(translation).with_kind(TransformKind::Component(ComponentMode::Face))
}

#[test]
fn face_drag_grows_radius_symmetrically() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;
    map.set_key_value(light, "origin", "0 0 0")?;
    grab_right_face(&mut map, light)?;

    let EntityKind::Light(inner) = map.entity(light)?.kind() else {
        panic!("light class must create a light");
    };
    assert_eq!(inner.drag_planes().selected_faces(), FaceMask::RIGHT);

    map.apply_transform(light, &face_drag(DVec3::new(16.0, 0.0, 0.0)))?;

    assert_eq!(key(&map, light, "light_radius"), "336 320 320");
    assert_eq!(key(&map, light, "origin"), "0 0 0");
    Ok(())
}

#[test]
fn face_drag_moves_origin_when_asymmetric() -> anyhow::Result<()> {
    let settings = EntitySettings {
        drag_resize_symmetrically: false,
        ..Default::default()
    };
    let mut map = MapRoot::with_settings(EntityClassRegistry::with_builtin_classes(), settings);
    let light = map.add_entity("light")?;
    grab_right_face(&mut map, light)?;

    map.apply_transform(light, &face_drag(DVec3::new(16.0, 0.0, 0.0)))?;

    assert_eq!(key(&map, light, "light_radius"), "328 320 320");
    assert_eq!(key(&map, light, "origin"), "8 0 0");
    Ok(())
}

// ============================================================================
// Snapping
// ============================================================================

#[test]
fn snap_rounds_origin_to_grid() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "origin", "3.4 7.6 0")?;

    map.snap_to(player, 4.0)?;

    assert_eq!(key(&map, player, "origin"), "4 8 0");
    Ok(())
}

#[test]
fn snap_moves_primitive_points() -> anyhow::Result<()> {
    let mut map = new_map();
    let root = map.root();
    let brush = map.add_primitive(root, vec![DVec3::new(1.2, 2.9, -0.4)])?;

    map.snap_to(brush, 1.0)?;

    assert_eq!(map.node(brush)?.primitive().unwrap().points(), vec![DVec3::new(1.0, 3.0, 0.0)]);
    Ok(())
}
