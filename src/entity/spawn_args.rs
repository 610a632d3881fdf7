//! Spawnargs
//!
//! The ordered key/value list of one entity. Keys match case-insensitively,
//! lookups fall back to the entity class, and every structural change is
//! reported to the attached [`SpawnArgsObserver`]s:
//!
//! - a new key: `on_key_insert`
//! - a changed value: `on_key_change` (plus the key's own observers)
//! - a removed key: `on_key_erase`, after the key left the list
//!
//! Before the first mutation inside an undoable operation the complete list
//! is saved to the connected [`UndoRecorder`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::rc::{Rc, Weak};

use rustc_hash::FxHasher;

use super::eclass::EntityClass;
use super::key_value::KeyValue;
use crate::undo::{UndoMemento, UndoRecorder, UndoTarget, Undoable};

/// Receives structural changes of a [`SpawnArgs`] list.
pub trait SpawnArgsObserver {
    fn on_key_insert(&self, key: &str, value: &Rc<KeyValue>);

    fn on_key_change(&self, _key: &str, _value: &str) {}

    fn on_key_erase(&self, key: &str, value: &Rc<KeyValue>);
}

pub struct SpawnArgs {
    self_ref: Weak<SpawnArgs>,
    eclass: Rc<EntityClass>,
    key_values: RefCell<Vec<(String, Rc<KeyValue>)>>,
    observers: RefCell<Vec<(u64, Weak<dyn SpawnArgsObserver>)>>,
    next_observer_id: Cell<u64>,
    undo: RefCell<Weak<UndoRecorder>>,
    is_container: Cell<bool>,
}

impl SpawnArgs {
    #[must_use]
    pub fn new(eclass: Rc<EntityClass>) -> Rc<Self> {
        let is_container = !eclass.is_fixed_size();
        Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            eclass,
            key_values: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_observer_id: Cell::new(1),
            undo: RefCell::new(Weak::new()),
            is_container: Cell::new(is_container),
        })
    }

    /// A fresh list with the same class and key/value strings. Observers
    /// and undo wiring are not copied.
    #[must_use]
    pub fn copy_of(other: &SpawnArgs) -> Rc<Self> {
        let copy = Self::new(other.eclass.clone());
        copy.is_container.set(other.is_container.get());
        for (key, value) in other.key_values() {
            copy.set_key_value(&key, &value);
        }
        copy
    }

    #[inline]
    #[must_use]
    pub fn entity_class(&self) -> &Rc<EntityClass> {
        &self.eclass
    }

    /// Sets `key` to `value`; an empty value erases the key.
    pub fn set_key_value(&self, key: &str, value: &str) {
        if value.is_empty() {
            self.erase_key(key);
            return;
        }

        if let Some(existing) = self.key_value(key) {
            if existing.get() == value {
                return;
            }
            self.save_undo();
            if existing.assign(value) {
                self.notify_change(key, &existing.get());
            }
        } else {
            self.save_undo();
            let key_value = KeyValue::new(value, self.eclass.attribute_value(key));
            self.key_values
                .borrow_mut()
                .push((key.to_owned(), key_value.clone()));
            self.notify_insert(key, &key_value);
        }
    }

    /// Removes `key` if it is set locally.
    pub fn erase_key(&self, key: &str) {
        let Some(index) = self.position(key) else {
            return;
        };
        self.save_undo();
        let (stored_key, key_value) = self.key_values.borrow_mut().remove(index);
        self.notify_erase(&stored_key, &key_value);
    }

    /// The local value, or the class default, or an empty string.
    #[must_use]
    pub fn get_key_value(&self, key: &str) -> String {
        match self.key_value(key) {
            Some(key_value) => key_value.get(),
            None => self.eclass.attribute_value(key).to_owned(),
        }
    }

    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// The live value cell of a locally set key.
    #[must_use]
    pub fn key_value(&self, key: &str) -> Option<Rc<KeyValue>> {
        self.key_values
            .borrow()
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, key_value)| key_value.clone())
    }

    /// True if `key` is not set locally but the class provides a value.
    #[must_use]
    pub fn is_inherited(&self, key: &str) -> bool {
        !self.has_key(key) && !self.eclass.attribute_value(key).is_empty()
    }

    /// Local key/value pairs in order.
    #[must_use]
    pub fn key_values(&self) -> Vec<(String, String)> {
        self.key_values
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.get()))
            .collect()
    }

    /// Visits the local pairs, then (optionally) the class attributes.
    pub fn for_each_key_value(&self, mut visit: impl FnMut(&str, &str), include_inherited: bool) {
        for (key, value) in self.key_values() {
            visit(&key, &value);
        }
        if include_inherited {
            self.eclass.for_each_attribute(visit);
        }
    }

    /// Local pairs whose key starts with `prefix`, ignoring case.
    #[must_use]
    pub fn key_values_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.key_values()
            .into_iter()
            .filter(|(key, _)| starts_with_ignore_case(key, prefix))
            .collect()
    }

    #[must_use]
    pub fn classname(&self) -> String {
        let classname = self.get_key_value("classname");
        if classname.is_empty() {
            self.eclass.name().to_owned()
        } else {
            classname
        }
    }

    #[must_use]
    pub fn is_worldspawn(&self) -> bool {
        self.classname() == "worldspawn"
    }

    /// Containers own child primitives, point entities do not.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.is_container.get()
    }

    pub fn set_is_container(&self, is_container: bool) {
        self.is_container.set(is_container);
    }

    /// Hash of the lowercased local pairs, independent of their order.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let sorted: BTreeMap<String, String> = self
            .key_values()
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value.to_lowercase()))
            .collect();

        let mut hasher = FxHasher::default();
        for (key, value) in &sorted {
            hasher.write(key.as_bytes());
            hasher.write_u8(0xff);
            hasher.write(value.as_bytes());
            hasher.write_u8(0xff);
        }
        hasher.finish()
    }

    /// Attaches `observer` and replays `on_key_insert` for every existing
    /// key.
    pub fn attach_observer(&self, observer: &Rc<dyn SpawnArgsObserver>) -> u64 {
        let id = self.next_observer_id.get();
        self.next_observer_id.set(id + 1);
        self.observers.borrow_mut().push((id, Rc::downgrade(observer)));

        let snapshot = self.key_values.borrow().clone();
        for (key, value) in &snapshot {
            observer.on_key_insert(key, value);
        }
        id
    }

    /// Detaches the observer `id` and replays `on_key_erase` for every key
    /// so it can shut down cleanly. An observer that is already being
    /// dropped receives nothing.
    pub fn detach_observer(&self, id: u64) {
        let removed = {
            let mut observers = self.observers.borrow_mut();
            observers
                .iter()
                .position(|(observer, _)| *observer == id)
                .map(|index| observers.remove(index).1)
        };
        let Some(observer) = removed.and_then(|weak| weak.upgrade()) else {
            return;
        };
        let snapshot = self.key_values.borrow().clone();
        for (key, value) in &snapshot {
            observer.on_key_erase(key, value);
        }
    }

    /// Routes undo snapshots to `recorder` from now on.
    pub fn connect_undo(&self, recorder: &Rc<UndoRecorder>) {
        *self.undo.borrow_mut() = Rc::downgrade(recorder);
    }

    pub fn disconnect_undo(&self) {
        *self.undo.borrow_mut() = Weak::new();
    }

    #[must_use]
    pub fn is_undo_connected(&self) -> bool {
        self.undo.borrow().strong_count() > 0
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.key_values
            .borrow()
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(key))
    }

    fn save_undo(&self) {
        let recorder = self.undo.borrow().upgrade();
        if let Some(recorder) = recorder {
            let target: Weak<dyn Undoable> = self.self_ref.clone();
            recorder.save(UndoTarget::Object(target), || self.export_state());
        }
    }

    fn live_observers(&self) -> Vec<(u64, Rc<dyn SpawnArgsObserver>)> {
        self.observers
            .borrow()
            .iter()
            .filter_map(|(id, observer)| observer.upgrade().map(|observer| (*id, observer)))
            .collect()
    }

    fn is_observer_attached(&self, id: u64) -> bool {
        self.observers.borrow().iter().any(|(observer, _)| *observer == id)
    }

    fn notify_insert(&self, key: &str, value: &Rc<KeyValue>) {
        for (id, observer) in self.live_observers() {
            if self.is_observer_attached(id) {
                observer.on_key_insert(key, value);
            }
        }
    }

    fn notify_change(&self, key: &str, value: &str) {
        for (id, observer) in self.live_observers() {
            if self.is_observer_attached(id) {
                observer.on_key_change(key, value);
            }
        }
    }

    fn notify_erase(&self, key: &str, value: &Rc<KeyValue>) {
        for (id, observer) in self.live_observers() {
            if self.is_observer_attached(id) {
                observer.on_key_erase(key, value);
            }
        }
    }
}

impl Undoable for SpawnArgs {
    fn export_state(&self) -> UndoMemento {
        UndoMemento::KeyValues(self.key_values())
    }

    /// Restores the saved list with the fewest notifications: keys missing
    /// from the snapshot are erased, the rest assigned or inserted, and the
    /// order is restored last.
    fn import_state(&self, memento: &UndoMemento) {
        let UndoMemento::KeyValues(pairs) = memento else {
            log::error!("SpawnArgs: cannot import a non key/value snapshot");
            return;
        };

        let stale: Vec<String> = self
            .key_values
            .borrow()
            .iter()
            .filter(|(key, _)| !pairs.iter().any(|(saved, _)| saved.eq_ignore_ascii_case(key)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.erase_key(&key);
        }

        for (key, value) in pairs {
            self.set_key_value(key, value);
        }

        let mut key_values = self.key_values.borrow_mut();
        let mut ordered = Vec::with_capacity(key_values.len());
        for (key, _) in pairs {
            if let Some(index) = key_values
                .iter()
                .position(|(existing, _)| existing.eq_ignore_ascii_case(key))
            {
                let (_, value) = key_values.remove(index);
                ordered.push((key.clone(), value));
            }
        }
        ordered.append(&mut key_values);
        *key_values = ordered;
    }
}

impl fmt::Debug for SpawnArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnArgs")
            .field("eclass", &self.eclass.name())
            .field("key_values", &self.key_values())
            .field("observers", &self.observers.borrow().len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
}
