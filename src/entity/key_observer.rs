use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::key_value::{KeyCallback, KeyValue};
use super::spawn_args::{SpawnArgs, SpawnArgsObserver};

struct Entry {
    /// Lowercased key.
    key: String,
    id: u64,
    callback: KeyCallback,
    /// The value cell the callback is attached to and its observer id there.
    attached: Option<(Weak<KeyValue>, u64)>,
}

/// Per-entity registry of key callbacks.
///
/// A callback may be registered before its key exists: it is attached to
/// the value cell as soon as the key is inserted, detached (receiving the
/// class default) when the key is erased, and attached again on the next
/// insert.
pub struct KeyObserverMap {
    self_ref: Weak<KeyObserverMap>,
    spawn_args: Weak<SpawnArgs>,
    observer_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
}

impl KeyObserverMap {
    #[must_use]
    pub fn new(spawn_args: &Rc<SpawnArgs>) -> Rc<Self> {
        let map = Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            spawn_args: Rc::downgrade(spawn_args),
            observer_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        });
        let observer: Rc<dyn SpawnArgsObserver> = map.clone();
        map.observer_id.set(spawn_args.attach_observer(&observer));
        map
    }

    /// Calls `callback` now with the current value of `key` (the class
    /// default or `""` if unset) and after every change of it, until the
    /// returned subscription is dropped.
    #[must_use = "dropping the subscription stops the observation"]
    pub fn observe_key(&self, key: &str, callback: impl Fn(&str) + 'static) -> KeySubscription {
        let callback: KeyCallback = Rc::new(callback);
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let spawn_args = self.spawn_args.upgrade();
        let attached = match spawn_args.as_ref().and_then(|args| args.key_value(key)) {
            Some(key_value) => {
                let observer = key_value.attach(callback.clone());
                Some((Rc::downgrade(&key_value), observer))
            }
            None => {
                let value = spawn_args
                    .as_ref()
                    .map(|args| args.get_key_value(key))
                    .unwrap_or_default();
                callback(&value);
                None
            }
        };

        self.entries.borrow_mut().push(Entry {
            key: key.to_ascii_lowercase(),
            id,
            callback,
            attached,
        });

        KeySubscription {
            map: self.self_ref.clone(),
            id,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| entries.remove(index))
        };
        if let Some((key_value, observer)) = removed.and_then(|entry| entry.attached) {
            if let Some(key_value) = key_value.upgrade() {
                key_value.detach(observer, false);
            }
        }
    }
}

impl SpawnArgsObserver for KeyObserverMap {
    fn on_key_insert(&self, key: &str, value: &Rc<KeyValue>) {
        let pending: Vec<(u64, KeyCallback)> = self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.attached.is_none() && entry.key.eq_ignore_ascii_case(key))
            .map(|entry| (entry.id, entry.callback.clone()))
            .collect();

        for (id, callback) in pending {
            let observer = value.attach(callback);
            // the callback may have dropped its own subscription
            let stored = self
                .entries
                .borrow_mut()
                .iter_mut()
                .find(|entry| entry.id == id)
                .map(|entry| entry.attached = Some((Rc::downgrade(value), observer)))
                .is_some();
            if !stored {
                value.detach(observer, false);
            }
        }
    }

    fn on_key_erase(&self, key: &str, value: &Rc<KeyValue>) {
        let attached: Vec<u64> = self
            .entries
            .borrow_mut()
            .iter_mut()
            .filter(|entry| entry.key.eq_ignore_ascii_case(key))
            .filter_map(|entry| {
                let is_this_value = entry
                    .attached
                    .as_ref()
                    .is_some_and(|(attached, _)| std::ptr::eq(attached.as_ptr(), Rc::as_ptr(value)));
                if is_this_value {
                    entry.attached.take().map(|(_, observer)| observer)
                } else {
                    None
                }
            })
            .collect();

        for observer in attached {
            value.detach(observer, true);
        }
    }
}

impl Drop for KeyObserverMap {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().drain(..) {
            if let Some((key_value, observer)) = entry.attached {
                if let Some(key_value) = key_value.upgrade() {
                    key_value.detach(observer, false);
                }
            }
        }
        if let Some(spawn_args) = self.spawn_args.upgrade() {
            spawn_args.detach_observer(self.observer_id.get());
        }
    }
}

impl fmt::Debug for KeyObserverMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.entries.borrow().iter().map(|entry| entry.key.clone()).collect();
        f.debug_struct("KeyObserverMap").field("keys", &keys).finish()
    }
}

/// Keeps a key callback registered; dropping it unregisters.
#[derive(Debug)]
pub struct KeySubscription {
    map: Weak<KeyObserverMap>,
    id: u64,
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        if let Some(map) = self.map.upgrade() {
            map.remove(self.id);
        }
    }
}
