//! Spawnarg and key observer tests
//!
//! Tests for:
//! - Ordered key/value storage with entity class fallback
//! - Observer initial-value contract
//! - Re-entrant writes from observer callbacks
//! - Subscription lifetime
//! - Entity level observers (insert / change / erase)

use std::cell::RefCell;
use std::rc::Rc;

use mapcore::entity::{EntityClass, KeyObserverMap, KeyValue, SpawnArgs, SpawnArgsObserver};

// ============================================================================
// Helper
// ============================================================================

fn light_class() -> Rc<EntityClass> {
    EntityClass::builder("light")
        .attribute("light_radius", "320 320 320")
        .bounds(glam::DVec3::splat(-8.0), glam::DVec3::splat(8.0))
        .build()
}

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |value: &str| sink.borrow_mut().push(value.to_owned()))
}

#[derive(Default)]
struct EventLog {
    events: RefCell<Vec<String>>,
}

impl SpawnArgsObserver for EventLog {
    fn on_key_insert(&self, key: &str, value: &Rc<KeyValue>) {
        self.events.borrow_mut().push(format!("insert {key}={}", value.get()));
    }

    fn on_key_change(&self, key: &str, value: &str) {
        self.events.borrow_mut().push(format!("change {key}={value}"));
    }

    fn on_key_erase(&self, key: &str, _value: &Rc<KeyValue>) {
        self.events.borrow_mut().push(format!("erase {key}"));
    }
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn unset_key_falls_back_to_class_default() {
    let spawn_args = SpawnArgs::new(light_class());
    assert_eq!(spawn_args.get_key_value("light_radius"), "320 320 320");
    assert!(spawn_args.is_inherited("light_radius"));
    assert!(!spawn_args.has_key("light_radius"));
    assert_eq!(spawn_args.get_key_value("nonexistent"), "");

    spawn_args.set_key_value("light_radius", "64 64 64");
    assert!(!spawn_args.is_inherited("light_radius"));
    assert_eq!(spawn_args.get_key_value("LIGHT_RADIUS"), "64 64 64");
}

#[test]
fn setting_empty_value_erases_key() {
    let spawn_args = SpawnArgs::new(light_class());
    spawn_args.set_key_value("name", "lamp");
    spawn_args.set_key_value("name", "");
    assert!(!spawn_args.has_key("name"));
    assert!(spawn_args.key_values().is_empty());
}

#[test]
fn key_order_is_insertion_order() {
    let spawn_args = SpawnArgs::new(light_class());
    spawn_args.set_key_value("origin", "0 0 0");
    spawn_args.set_key_value("target1", "b");
    spawn_args.set_key_value("name", "a");
    spawn_args.set_key_value("target0", "c");
    spawn_args.set_key_value("origin", "1 0 0");

    let keys: Vec<String> = spawn_args.key_values().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, ["origin", "target1", "name", "target0"]);
    assert_eq!(
        spawn_args.key_values_with_prefix("TARGET"),
        vec![
            ("target1".to_owned(), "b".to_owned()),
            ("target0".to_owned(), "c".to_owned())
        ]
    );
}

#[test]
fn copy_shares_no_state() {
    let original = SpawnArgs::new(light_class());
    original.set_key_value("name", "lamp");
    let copy = SpawnArgs::copy_of(&original);
    copy.set_key_value("name", "other");

    assert_eq!(original.get_key_value("name"), "lamp");
    assert_eq!(copy.classname(), original.classname());
}

// ============================================================================
// Key observers
// ============================================================================

#[test]
fn observer_gets_empty_value_for_unset_key() {
    let spawn_args = SpawnArgs::new(light_class());
    let observers = KeyObserverMap::new(&spawn_args);
    let (seen, callback) = recorder();
    let _subscription = observers.observe_key("origin", callback);

    assert_eq!(*seen.borrow(), [""]);
}

#[test]
fn observer_gets_inherited_default_for_unset_key() {
    let spawn_args = SpawnArgs::new(light_class());
    let observers = KeyObserverMap::new(&spawn_args);
    let (seen, callback) = recorder();
    let _subscription = observers.observe_key("light_radius", callback);

    assert_eq!(*seen.borrow(), ["320 320 320"]);
}

#[test]
fn observer_follows_changes_and_receives_default_on_erase() {
    let spawn_args = SpawnArgs::new(light_class());
    spawn_args.set_key_value("light_radius", "10 10 10");
    let observers = KeyObserverMap::new(&spawn_args);
    let (seen, callback) = recorder();
    let _subscription = observers.observe_key("light_radius", callback);

    spawn_args.set_key_value("light_radius", "20 20 20");
    spawn_args.set_key_value("light_radius", "20 20 20");
    spawn_args.erase_key("light_radius");

    assert_eq!(*seen.borrow(), ["10 10 10", "20 20 20", "320 320 320"]);
}

#[test]
fn observer_may_write_other_keys() {
    let spawn_args = SpawnArgs::new(light_class());
    let observers = KeyObserverMap::new(&spawn_args);
    let writer = Rc::downgrade(&spawn_args);
    let _mirror = observers.observe_key("name", move |value| {
        if let Some(spawn_args) = writer.upgrade() {
            spawn_args.set_key_value("mirror", value);
        }
    });
    let (seen, callback) = recorder();
    let _watch = observers.observe_key("mirror", callback);

    spawn_args.set_key_value("name", "lamp");
    spawn_args.set_key_value("name", "bulb");

    assert_eq!(spawn_args.get_key_value("mirror"), "bulb");
    assert_eq!(*seen.borrow(), ["", "lamp", "bulb"]);
}

#[test]
fn observer_may_write_its_own_key() {
    let spawn_args = SpawnArgs::new(light_class());
    let observers = KeyObserverMap::new(&spawn_args);
    let writer = Rc::downgrade(&spawn_args);
    let _clamp = observers.observe_key("count", move |value| {
        if value.len() > 3 {
            if let Some(spawn_args) = writer.upgrade() {
                spawn_args.set_key_value("count", &value[..3]);
            }
        }
    });

    spawn_args.set_key_value("count", "123456");
    assert_eq!(spawn_args.get_key_value("count"), "123");
}

#[test]
fn dropped_subscription_is_silent() {
    let spawn_args = SpawnArgs::new(light_class());
    let observers = KeyObserverMap::new(&spawn_args);
    let (seen, callback) = recorder();
    let subscription = observers.observe_key("origin", callback);
    drop(subscription);

    spawn_args.set_key_value("origin", "1 2 3");
    assert_eq!(*seen.borrow(), [""]);
    assert!(observers.is_empty());
}

// ============================================================================
// Entity level observers
// ============================================================================

#[test]
fn attaching_replays_existing_keys() {
    let spawn_args = SpawnArgs::new(light_class());
    spawn_args.set_key_value("origin", "0 0 0");
    spawn_args.set_key_value("name", "lamp");

    let log = Rc::new(EventLog::default());
    let observer: Rc<dyn SpawnArgsObserver> = log.clone();
    let id = spawn_args.attach_observer(&observer);

    spawn_args.set_key_value("name", "bulb");
    spawn_args.erase_key("origin");
    spawn_args.detach_observer(id);
    spawn_args.set_key_value("target", "other");

    assert_eq!(
        *log.events.borrow(),
        [
            "insert origin=0 0 0",
            "insert name=lamp",
            "change name=bulb",
            "erase origin",
            "erase name",
        ]
    );
}

#[test]
fn fingerprint_changes_with_values() {
    let a = SpawnArgs::new(light_class());
    let b = SpawnArgs::new(light_class());
    a.set_key_value("origin", "0 0 0");
    a.set_key_value("name", "lamp");
    b.set_key_value("name", "LAMP");
    b.set_key_value("origin", "0 0 0");
    assert_eq!(a.fingerprint(), b.fingerprint());

    b.set_key_value("origin", "0 0 1");
    assert_ne!(a.fingerprint(), b.fingerprint());
}
