//! Name bookkeeping of one entity.
//!
//! The tracker watches the `name` key and every name reference key
//! (`target*`, `bind`) of its entity. While connected to a [`Namespace`] it
//! keeps the entity's name registered there and subscribes each reference
//! to renames of the name it points to. While the entity is in the scene it
//! also keeps the map's [`TargetManager`] pointing at the entity's node.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::key_value::KeyValue;
use super::spawn_args::{SpawnArgs, SpawnArgsObserver, starts_with_ignore_case};
use crate::namespace::Namespace;
use crate::scene::NodeHandle;
use crate::target::TargetManager;

pub const NAME_KEY: &str = "name";

/// True for keys whose value is the name of another entity.
#[must_use]
pub fn is_name_reference_key(key: &str) -> bool {
    starts_with_ignore_case(key, "target") || key.eq_ignore_ascii_case("bind")
}

struct Reference {
    key: String,
    value: String,
    /// Namespace observer id while connected.
    observer: Option<u64>,
}

pub struct NameTracker {
    spawn_args: Weak<SpawnArgs>,
    name: RefCell<String>,
    references: RefCell<Vec<Reference>>,
    namespace: RefCell<Weak<Namespace>>,
    target_registration: RefCell<Option<(Weak<TargetManager>, NodeHandle)>>,
    /// Set while the tracker itself writes the name key.
    updating: Cell<bool>,
}

impl NameTracker {
    #[must_use]
    pub fn new(spawn_args: &Rc<SpawnArgs>) -> Rc<Self> {
        Rc::new(Self {
            spawn_args: Rc::downgrade(spawn_args),
            name: RefCell::new(String::new()),
            references: RefCell::new(Vec::new()),
            namespace: RefCell::new(Weak::new()),
            target_registration: RefCell::new(None),
            updating: Cell::new(false),
        })
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Sets the `name` key. Renames onto a taken name are redirected to a
    /// free one while connected.
    pub fn change_name(&self, name: &str) {
        if let Some(spawn_args) = self.spawn_args.upgrade() {
            spawn_args.set_key_value(NAME_KEY, name);
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<Rc<Namespace>> {
        self.namespace.borrow().upgrade()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.namespace().is_some()
    }

    /// (key, referenced name) of every non-empty reference key.
    #[must_use]
    pub fn references(&self) -> Vec<(String, String)> {
        self.references
            .borrow()
            .iter()
            .filter(|reference| !reference.value.is_empty())
            .map(|reference| (reference.key.clone(), reference.value.clone()))
            .collect()
    }

    /// Registers the name and the references with `namespace`.
    pub fn connect(&self, namespace: &Rc<Namespace>) {
        if self.is_connected() {
            log::warn!("NameTracker: '{}' is already connected to a namespace", self.name());
            return;
        }
        *self.namespace.borrow_mut() = Rc::downgrade(namespace);

        let name = self.name();
        if !name.is_empty() && !namespace.insert(&name) {
            log::warn!("NameTracker: name '{name}' is not unique in its namespace");
        }

        let pending: Vec<(String, String)> = self
            .references
            .borrow()
            .iter()
            .map(|reference| (reference.key.clone(), reference.value.clone()))
            .collect();
        for (key, value) in pending {
            let observer = self.observe_reference(namespace, &key, &value);
            self.set_reference_observer(&key, observer);
        }
    }

    /// Unregisters everything from `namespace`.
    pub fn disconnect(&self, namespace: &Rc<Namespace>) {
        let connected = self.namespace().is_some_and(|current| Rc::ptr_eq(&current, namespace));
        if !connected {
            log::warn!("NameTracker: '{}' is not connected to this namespace", self.name());
            return;
        }

        for reference in self.references.borrow_mut().iter_mut() {
            if let Some(observer) = reference.observer.take() {
                namespace.remove_name_observer(observer);
            }
        }
        let name = self.name();
        if !name.is_empty() {
            namespace.erase(&name);
        }
        *self.namespace.borrow_mut() = Weak::new();
    }

    /// Keeps `targets` resolving the entity's name to `node` until
    /// [`NameTracker::unregister_target`].
    pub fn register_target(&self, targets: &Rc<TargetManager>, node: NodeHandle) {
        targets.associate(&self.name(), node);
        *self.target_registration.borrow_mut() = Some((Rc::downgrade(targets), node));
    }

    pub fn unregister_target(&self) {
        let registration = self.target_registration.borrow_mut().take();
        if let Some((targets, node)) = registration {
            if let Some(targets) = targets.upgrade() {
                targets.clear(&self.name(), node);
            }
        }
    }

    fn observe_reference(&self, namespace: &Namespace, key: &str, value: &str) -> Option<u64> {
        if value.is_empty() {
            return None;
        }
        let spawn_args = self.spawn_args.clone();
        let key = key.to_owned();
        let id = namespace.add_name_observer(
            value,
            Rc::new(move |new_name: &str| {
                if let Some(spawn_args) = spawn_args.upgrade() {
                    spawn_args.set_key_value(&key, new_name);
                }
            }),
        );
        Some(id)
    }

    fn set_reference_observer(&self, key: &str, observer: Option<u64>) {
        let stored = self
            .references
            .borrow_mut()
            .iter_mut()
            .find(|reference| reference.key.eq_ignore_ascii_case(key))
            .map(|reference| reference.observer = observer)
            .is_some();
        // the key went away while the observer was being registered
        if !stored {
            if let (Some(observer), Some(namespace)) = (observer, self.namespace()) {
                namespace.remove_name_observer(observer);
            }
        }
    }

    fn reference_changed(&self, key: &str, value: &str) {
        let previous = {
            let mut references = self.references.borrow_mut();
            let existing = references
                .iter()
                .position(|reference| reference.key.eq_ignore_ascii_case(key));
            if let Some(index) = existing {
                value.clone_into(&mut references[index].value);
                references[index].observer.take()
            } else {
                references.push(Reference {
                    key: key.to_owned(),
                    value: value.to_owned(),
                    observer: None,
                });
                None
            }
        };

        let Some(namespace) = self.namespace() else {
            return;
        };
        if let Some(previous) = previous {
            namespace.remove_name_observer(previous);
        }
        let observer = self.observe_reference(&namespace, key, value);
        self.set_reference_observer(key, observer);
    }

    fn reference_erased(&self, key: &str) {
        let removed: Vec<Reference> = {
            let mut references = self.references.borrow_mut();
            let (removed, kept) = references
                .drain(..)
                .partition(|reference| reference.key.eq_ignore_ascii_case(key));
            *references = kept;
            removed
        };
        if let Some(namespace) = self.namespace() {
            for observer in removed.into_iter().filter_map(|reference| reference.observer) {
                namespace.remove_name_observer(observer);
            }
        }
    }

    fn name_changed(&self, new: &str) {
        let old = self.name.replace(new.to_owned());
        if self.updating.get() || old == new {
            return;
        }

        let mut name = new.to_owned();
        if let Some(namespace) = self.namespace() {
            if !new.is_empty() && namespace.name_exists(new) {
                name = namespace.make_unique(new);
                log::info!("Entity name '{new}' is taken, using '{name}'");
                if let Some(spawn_args) = self.spawn_args.upgrade() {
                    self.updating.set(true);
                    spawn_args.set_key_value(NAME_KEY, &name);
                    self.updating.set(false);
                }
            }
            namespace.name_changed(&old, &name);
        }

        let registration = self.target_registration.borrow().clone();
        if let Some((targets, node)) = registration {
            if let Some(targets) = targets.upgrade() {
                targets.clear(&old, node);
                targets.associate(&name, node);
            }
        }
    }
}

impl SpawnArgsObserver for NameTracker {
    fn on_key_insert(&self, key: &str, value: &Rc<KeyValue>) {
        if key.eq_ignore_ascii_case(NAME_KEY) {
            self.name_changed(&value.get());
        } else if is_name_reference_key(key) {
            self.reference_changed(key, &value.get());
        }
    }

    fn on_key_change(&self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case(NAME_KEY) {
            self.name_changed(value);
        } else if is_name_reference_key(key) {
            self.reference_changed(key, value);
        }
    }

    fn on_key_erase(&self, key: &str, _value: &Rc<KeyValue>) {
        if key.eq_ignore_ascii_case(NAME_KEY) {
            self.name_changed("");
        } else if is_name_reference_key(key) {
            self.reference_erased(key);
        }
    }
}

impl fmt::Debug for NameTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTracker")
            .field("name", &self.name())
            .field("references", &self.references())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
