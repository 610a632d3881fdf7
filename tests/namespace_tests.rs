//! Namespace and Target Integration Tests
//!
//! Tests for:
//! - Unique entity names within one map
//! - References following renames
//! - Clone / paste name merging
//! - Entity connection (`targetN` keys)
//! - Target lines and name resolution

use glam::DVec3;
use mapcore::{EntityClassRegistry, MapRoot, NodeHandle};

fn new_map() -> MapRoot {
    let _ = env_logger::builder().is_test(true).try_init();
    MapRoot::new(EntityClassRegistry::with_builtin_classes())
}

fn key(map: &MapRoot, handle: NodeHandle, key: &str) -> String {
    map.spawn_args(handle).unwrap().get_key_value(key)
}

// ============================================================================
// Uniqueness
// ============================================================================

#[test]
fn taken_name_is_replaced_by_free_variant() -> anyhow::Result<()> {
    let mut map = new_map();
    let first = map.add_entity("light")?;
    let second = map.add_entity("light")?;
    map.set_key_value(first, "name", "lamp")?;
    map.set_key_value(second, "name", "lamp")?;

    assert_eq!(key(&map, second, "name"), "lamp_1");
    assert_eq!(map.namespace().names(), ["lamp", "lamp_1"]);
    assert_eq!(map.find_entity("lamp_1"), Some(second));
    Ok(())
}

#[test]
fn erasing_name_frees_it() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "name", "lamp")?;
    map.set_key_value(lamp, "name", "")?;

    assert!(!map.namespace().name_exists("lamp"));
    assert_eq!(map.find_entity("lamp"), None);
    Ok(())
}

#[test]
fn detached_entities_do_not_claim_names() -> anyhow::Result<()> {
    let mut map = new_map();
    let loose = map.create_entity("light")?;
    map.spawn_args(loose)?.set_key_value("name", "lamp");

    assert!(!map.namespace().name_exists("lamp"));

    let placed = map.add_entity("light")?;
    map.set_key_value(placed, "name", "lamp")?;
    map.attach(map.root(), loose)?;

    assert_eq!(key(&map, placed, "name"), "lamp");
    assert_eq!(key(&map, loose, "name"), "lamp_1");
    Ok(())
}

// ============================================================================
// References
// ============================================================================

#[test]
fn references_follow_renames() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "name", "lamp")?;
    map.set_key_value(source, "target0", "lamp")?;
    map.set_key_value(source, "bind", "lamp")?;

    map.set_key_value(lamp, "name", "bulb")?;

    assert_eq!(key(&map, source, "target0"), "bulb");
    assert_eq!(key(&map, source, "bind"), "bulb");
    assert_eq!(map.find_entity("bulb"), Some(lamp));
    assert_eq!(map.find_entity("lamp"), None);
    Ok(())
}

#[test]
fn reference_to_missing_name_wakes_up_later() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    map.set_key_value(source, "target0", "ghost")?;
    assert!(map.target_lines(source)?.is_empty());

    let ghost = map.add_entity("light")?;
    map.set_key_value(ghost, "name", "ghost")?;
    assert_eq!(map.target_lines(source)?.len(), 1);

    map.set_key_value(ghost, "name", "spirit")?;
    assert_eq!(key(&map, source, "target0"), "spirit");
    Ok(())
}

// ============================================================================
// Clone / Paste
// ============================================================================

#[test]
fn pasted_clone_gets_unique_name() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "name", "lamp")?;

    let clone = map.clone_subgraph(lamp)?;
    assert!(!map.node(clone)?.is_in_scene());
    assert_eq!(key(&map, clone, "name"), "lamp");

    map.paste_subgraph(clone, map.root())?;

    assert_eq!(key(&map, clone, "name"), "lamp_1");
    assert_eq!(key(&map, lamp, "name"), "lamp");
    assert_eq!(map.find_entity("lamp_1"), Some(clone));
    Ok(())
}

#[test]
fn references_inside_clone_follow_renames() -> anyhow::Result<()> {
    let mut map = new_map();
    let mover = map.add_entity("func_static")?;
    map.set_key_value(mover, "name", "mover")?;
    let lamp = map.create_entity("light")?;
    map.attach(mover, lamp)?;
    map.set_key_value(lamp, "name", "lamp")?;
    map.set_key_value(mover, "target0", "lamp")?;

    let clone = map.clone_subgraph(mover)?;
    map.paste_subgraph(clone, map.root())?;

    let cloned_lamp = map.children(clone)?[0];
    assert_eq!(key(&map, clone, "name"), "mover_1");
    assert_eq!(key(&map, cloned_lamp, "name"), "lamp_1");
    assert_eq!(key(&map, clone, "target0"), "lamp_1");
    assert_eq!(key(&map, mover, "target0"), "lamp");
    Ok(())
}

#[test]
fn paste_is_undoable() -> anyhow::Result<()> {
    let mut map = new_map();
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "name", "lamp")?;
    let clone = map.clone_subgraph(lamp)?;
    map.paste_subgraph(clone, map.root())?;

    assert!(map.undo());
    assert!(!map.node(clone)?.is_in_scene());
    assert!(!map.namespace().name_exists("lamp_1"));
    assert!(map.namespace().name_exists("lamp"));
    Ok(())
}

// ============================================================================
// Connecting Entities
// ============================================================================

#[test]
fn connect_names_unnamed_target_and_uses_next_key() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    let first = map.add_entity("light")?;
    let second = map.add_entity("light")?;

    map.connect_entities(source, first)?;
    map.connect_entities(source, second)?;

    assert_eq!(key(&map, first, "name"), "light");
    assert_eq!(key(&map, second, "name"), "light_1");
    assert_eq!(key(&map, source, "target0"), "light");
    assert_eq!(key(&map, source, "target1"), "light_1");
    Ok(())
}

#[test]
fn connect_to_self_changes_nothing() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;

    map.connect_entities(source, source)?;

    assert_eq!(key(&map, source, "target0"), "");
    assert_eq!(map.undo_system().undo_len(), 0);
    Ok(())
}

#[test]
fn connect_is_one_undo_step() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    let lamp = map.add_entity("light")?;

    map.connect_entities(source, lamp)?;
    assert!(map.undo());

    assert_eq!(key(&map, source, "target0"), "");
    assert_eq!(key(&map, lamp, "name"), "");
    Ok(())
}

#[test]
fn target_lines_run_between_bounds_centres() -> anyhow::Result<()> {
    let mut map = new_map();
    let source = map.add_entity("info_player_start")?;
    let lamp = map.add_entity("light")?;
    map.set_key_value(lamp, "origin", "100 0 0")?;
    map.set_key_value(lamp, "name", "lamp")?;
    map.set_key_value(source, "target0", "lamp")?;
    map.set_key_value(source, "target1", "nobody")?;

    let lines = map.target_lines(source)?;

    assert_eq!(lines, vec![(DVec3::new(0.0, 0.0, 37.0), DVec3::new(100.0, 0.0, 0.0))]);
    Ok(())
}
