//! Selection Integration Tests
//!
//! Tests for:
//! - Whole-object picking across the scene, closest first
//! - Selection state queries
//! - Drag plane picking and the reversed-plane follow-up
//! - Selection pool bookkeeping

use std::cell::Cell;
use std::rc::Rc;

use glam::DVec3;
use mapcore::entity::EntityKind;
use mapcore::math::Aabb;
use mapcore::selection::{
    FaceMask, ObservedSelectable, RaySelectionTest, SelectionChangedFn, SelectionIntersection, SelectionPool,
};
use mapcore::{DragPlanes, EntityClassRegistry, MapRoot, NodeHandle, Selector};

fn new_map() -> MapRoot {
    MapRoot::new(EntityClassRegistry::with_builtin_classes())
}

fn looking_down_at(x: f64, y: f64) -> RaySelectionTest {
    RaySelectionTest::new(DVec3::new(x, y, 1000.0), DVec3::NEG_Z, 1.0)
}

fn light_faces(map: &MapRoot, light: NodeHandle) -> FaceMask {
    match map.entity(light).unwrap().kind() {
        EntityKind::Light(light) => light.drag_planes().selected_faces(),
        other => panic!("expected a light, got {}", other.name()),
    }
}

// ============================================================================
// Object Picking
// ============================================================================

#[test]
fn closest_entity_wins() -> anyhow::Result<()> {
    let mut map = new_map();
    let upper = map.add_entity("info_player_start")?;
    let lower = map.add_entity("info_player_start")?;
    map.set_key_value(lower, "origin", "0 0 -200")?;
    let aside = map.add_entity("info_player_start")?;
    map.set_key_value(aside, "origin", "500 0 0")?;

    let mut pool = SelectionPool::new();
    map.test_select(&looking_down_at(0.0, 0.0), &mut pool);

    assert_eq!(pool.len(), 2);
    assert!(pool.select_best());
    assert_eq!(map.selected_nodes(), vec![upper]);
    Ok(())
}

#[test]
fn primitives_are_pickable() -> anyhow::Result<()> {
    let mut map = new_map();
    let root = map.root();
    let brush = map.add_primitive(root, vec![DVec3::splat(-32.0), DVec3::splat(32.0)])?;

    let mut pool = SelectionPool::new();
    map.test_select(&looking_down_at(10.0, 10.0), &mut pool);
    pool.select_all();

    assert_eq!(map.selected_nodes(), vec![brush]);
    Ok(())
}

#[test]
fn detached_nodes_are_not_picked() -> anyhow::Result<()> {
    let mut map = new_map();
    map.create_entity("info_player_start")?;

    let mut pool = SelectionPool::new();
    map.test_select(&looking_down_at(0.0, 0.0), &mut pool);

    assert!(pool.is_empty());
    Ok(())
}

#[test]
fn set_selected_is_reflected_in_queries() -> anyhow::Result<()> {
    let mut map = new_map();
    let first = map.add_entity("light")?;
    let second = map.add_entity("speaker")?;

    map.set_selected(second, true)?;
    assert_eq!(map.selected_nodes(), vec![second]);
    assert!(map.entity(second)?.is_selected());

    map.set_selected(first, true)?;
    map.set_selected(second, false)?;
    assert_eq!(map.selected_nodes(), vec![first]);
    Ok(())
}

// ============================================================================
// Drag Planes
// ============================================================================

#[test]
fn corner_pick_grabs_two_faces() -> anyhow::Result<()> {
    let mut map = new_map();
    let light = map.add_entity("light")?;

    let mut pool = SelectionPool::new();
    let planes = map.select_planes(light, &looking_down_at(400.0, 400.0), &mut pool)?;
    pool.select_all();

    assert_eq!(planes.len(), 2);
    assert_eq!(light_faces(&map, light), FaceMask::RIGHT | FaceMask::FRONT);
    Ok(())
}

#[test]
fn reversed_planes_grab_touching_neighbour() -> anyhow::Result<()> {
    let mut map = new_map();
    let left = map.add_entity("light")?;
    let right = map.add_entity("light")?;
    map.set_key_value(right, "origin", "640 0 0")?;

    let mut pool = SelectionPool::new();
    let planes = map.select_planes(left, &looking_down_at(330.0, 0.0), &mut pool)?;
    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].normal, DVec3::X);
    assert_eq!(planes[0].dist, 320.0);

    map.select_reversed_planes(right, &mut pool, &planes)?;
    pool.select_all();

    assert_eq!(light_faces(&map, left), FaceMask::RIGHT);
    assert_eq!(light_faces(&map, right), FaceMask::LEFT);
    Ok(())
}

#[test]
fn ray_through_centre_selects_no_face() {
    let on_changed: SelectionChangedFn = Rc::new(|_: &ObservedSelectable| {});
    let mut drag = DragPlanes::new(&on_changed);
    let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
    let mut pool = SelectionPool::new();

    drag.select_planes(
        &aabb,
        &mut pool,
        &RaySelectionTest::new(DVec3::new(0.0, 0.0, 100.0), DVec3::NEG_Z, 1.0),
        &glam::DAffine3::IDENTITY,
        |_| {},
    );

    assert!(pool.is_empty());
    assert_eq!(drag.bounds, aabb);
}

#[test]
fn speaker_has_drag_planes_too() -> anyhow::Result<()> {
    let mut map = new_map();
    let speaker = map.add_entity("speaker")?;
    let mut pool = SelectionPool::new();

    let planes = map.select_planes(speaker, &looking_down_at(0.0, 50.0), &mut pool)?;

    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].normal, DVec3::Y);
    Ok(())
}

#[test]
fn point_entities_have_no_drag_planes() -> anyhow::Result<()> {
    let mut map = new_map();
    let player = map.add_entity("info_player_start")?;
    let mut pool = SelectionPool::new();
    assert!(map.select_planes(player, &looking_down_at(0.0, 0.0), &mut pool).is_err());
    Ok(())
}

// ============================================================================
// Selection Pool
// ============================================================================

#[test]
fn pool_keeps_closest_hit_per_candidate() {
    let changes = Rc::new(Cell::new(0));
    let counter = changes.clone();
    let near = ObservedSelectable::new(Rc::new(move |_: &ObservedSelectable| counter.set(counter.get() + 1)));
    let far = ObservedSelectable::detached();

    let mut pool = SelectionPool::new();
    pool.add_intersection(&near, SelectionIntersection::new(50.0, 0.0));
    pool.add_intersection(&far, SelectionIntersection::new(20.0, 0.0));
    pool.add_intersection(&near, SelectionIntersection::new(10.0, 0.0));

    assert_eq!(pool.len(), 2);
    assert!(Rc::ptr_eq(pool.best().unwrap(), &near));
    assert!(pool.select_best());
    assert!(near.is_selected());
    assert!(!far.is_selected());
    assert_eq!(changes.get(), 1);
}
