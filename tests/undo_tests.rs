//! Undo Integration Tests
//!
//! Tests for:
//! - Spawnarg snapshots restoring values and notifying observers
//! - Redo and redo invalidation
//! - Structural undo (removal) restoring namespace and target registration
//! - Primitive point snapshots
//! - Undo level bound

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use mapcore::{EntityClassRegistry, MapRoot, TransformDelta};

fn new_map() -> MapRoot {
    MapRoot::new(EntityClassRegistry::with_builtin_classes())
}

// ============================================================================
// Spawnargs
// ============================================================================

#[test]
fn undo_restores_value_and_notifies_observers() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;
    map.set_key_value(light, "origin", "0 0 0")?;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = map
        .entity(light)?
        .observe_key("origin", move |value| sink.borrow_mut().push(value.to_owned()));

    map.set_key_value(light, "origin", "10 0 0")?;
    assert!(map.undo());

    assert_eq!(map.spawn_args(light)?.get_key_value("origin"), "0 0 0");
    assert_eq!(*seen.borrow(), ["0 0 0", "10 0 0", "0 0 0"]);
    assert_eq!(map.node(light)?.local_to_parent().translation, DVec3::ZERO);
    Ok(())
}

#[test]
fn redo_reapplies_the_undone_edit() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "angle", "90")?;

    assert!(map.undo());
    assert_eq!(map.spawn_args(player)?.get_key_value("angle"), "");
    assert_eq!(map.undo_system().redo_len(), 1);

    assert!(map.redo());
    assert_eq!(map.spawn_args(player)?.get_key_value("angle"), "90");
    assert!(!map.redo());
    Ok(())
}

#[test]
fn new_operation_clears_redo() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "name", "spawn")?;
    assert!(map.undo());

    map.set_key_value(player, "name", "other")?;
    assert_eq!(map.undo_system().redo_len(), 0);
    assert!(!map.redo());
    Ok(())
}

#[test]
fn grouped_edits_undo_together() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;

    map.undo_system_mut().start();
    map.set_key_value(light, "origin", "1 2 3")?;
    map.set_key_value(light, "_color", "1 0 0")?;
    map.set_key_value(light, "origin", "4 5 6")?;
    map.undo_system_mut().finish("editLight");

    assert_eq!(map.undo_system().undo_names().collect::<Vec<_>>(), ["editLight"]);
    assert!(map.undo());
    let spawn_args = map.spawn_args(light)?;
    assert_eq!(spawn_args.get_key_value("origin"), "");
    assert_eq!(spawn_args.get_key_value("_color"), "");
    Ok(())
}

#[test]
fn empty_history_reports_nothing_to_undo() {
    let mut map = new_map();
    assert!(!map.undo());
    assert!(!map.redo());
}

#[test]
fn undo_is_refused_while_recording() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;
    map.set_key_value(light, "origin", "1 1 1")?;

    map.undo_system_mut().start();
    assert!(!map.undo());
    map.undo_system_mut().cancel();

    assert!(map.undo());
    Ok(())
}

#[test]
fn operation_names_follow_the_edit() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    map.set_key_value(player, "origin", "1 1 1")?;
    map.apply_transform(player, &TransformDelta::translation(DVec3::X))?;
    map.snap_to(player, 8.0)?;

    let names: Vec<&str> = map.undo_system().undo_names().collect();
    assert_eq!(names, ["entitySetKeyValue", "translate", "snapToGrid"]);
    Ok(())
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn undoing_removal_restores_name_and_target() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "name", "lamp")?;
    map.set_key_value(source, "target0", "lamp")?;
    assert_eq!(map.target_lines(source)?.len(), 1);

    map.undo_system_mut().start();
    map.remove_node(lamp)?;
    map.undo_system_mut().finish("deleteSelected");

    assert!(map.contains(lamp));
    assert!(!map.node(lamp)?.is_in_scene());
    assert!(!map.namespace().name_exists("lamp"));
    assert_eq!(map.find_entity("lamp"), None);
    assert!(map.target_lines(source)?.is_empty());

    assert!(map.undo());
    assert!(map.node(lamp)?.is_in_scene());
    assert_eq!(map.parent(lamp)?, Some(map.root()));
    assert!(map.namespace().name_exists("lamp"));
    assert_eq!(map.find_entity("lamp"), Some(lamp));
    assert_eq!(map.target_lines(source)?.len(), 1);

    assert!(map.redo());
    assert_eq!(map.find_entity("lamp"), None);
    Ok(())
}

#[test]
fn purge_keeps_nodes_referenced_by_history() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;

    map.undo_system_mut().start();
    map.remove_node(lamp)?;
    map.undo_system_mut().finish("deleteSelected");
    assert_eq!(map.purge_detached(), 0);
    assert!(map.contains(lamp));

    map.undo_system_mut().clear();
    assert_eq!(map.purge_detached(), 1);
    assert!(!map.contains(lamp));
    Ok(())
}

#[test]
fn primitive_points_come_back() -> anyhow::Result<()> {
    let mut map = new_map();
    let group = map.add_entity("func_static")?;
    let brush = map.add_primitive(group, vec![DVec3::ZERO, DVec3::ONE])?;

    map.apply_transform(group, &TransformDelta::translation(DVec3::new(0.0, 0.0, 32.0)))?;
    assert!(map.undo());

    assert_eq!(map.node(brush)?.primitive().unwrap().points(), vec![DVec3::ZERO, DVec3::ONE]);
    assert_eq!(map.spawn_args(group)?.get_key_value("origin"), "");
    Ok(())
}

// ============================================================================
// Levels
// ============================================================================

#[test]
fn history_is_bounded_by_levels() -> anyhow::Result<()> {
    let mut map = new_map();
    map.undo_system_mut().set_levels(2);
    let player = map.add_entity("info_player_start")?;

    for value in ["1 0 0", "2 0 0", "3 0 0"] {
        map.set_key_value(player, "origin", value)?;
    }
    assert_eq!(map.undo_system().undo_len(), 2);

    assert!(map.undo());
    assert!(map.undo());
    assert!(!map.undo());
    assert_eq!(map.spawn_args(player)?.get_key_value("origin"), "1 0 0");
    Ok(())
}
