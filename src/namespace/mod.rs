//! Namespaces
//!
//! A [`Namespace`] keeps the entity names of one map unique and tells name
//! references (`target*`, `bind`) when the name they point to changes.
//!
//! Entities take part through their [`NameTracker`]: connecting a tracker
//! registers its name and one observer per reference key. Collisions are
//! never reported to the caller, they are resolved by renaming:
//!
//! - a live rename onto a taken name gets a numeric postfix
//! - a pasted subgraph is merged with [`Namespace::merge_cloned_names`],
//!   which renames the pasted entities and rewrites the references inside
//!   the pasted subgraph to match

pub mod unique_names;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub use unique_names::UniqueNameSet;

use crate::entity::NameTracker;

/// Called with the new name when the observed name changes.
pub type NameObserverFn = Rc<dyn Fn(&str)>;

struct NameObserver {
    id: u64,
    name: String,
    callback: NameObserverFn,
}

#[derive(Default)]
pub struct Namespace {
    names: RefCell<UniqueNameSet>,
    observers: RefCell<Vec<NameObserver>>,
    next_observer_id: Cell<u64>,
}

impl Namespace {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn name_exists(&self, name: &str) -> bool {
        self.names.borrow().contains(name)
    }

    /// Returns false if the name was taken already.
    pub fn insert(&self, name: &str) -> bool {
        self.names.borrow_mut().insert(name)
    }

    pub fn erase(&self, name: &str) {
        self.names.borrow_mut().erase(name);
    }

    /// A free variant of `name`; nothing is inserted.
    #[must_use]
    pub fn make_unique(&self, name: &str) -> String {
        self.names.borrow().make_unique(name)
    }

    /// Inserts a free variant of `name` and returns it.
    pub fn add_unique_name(&self, name: &str) -> String {
        self.names.borrow_mut().insert_unique(name)
    }

    /// Registers `callback` for renames of `name`. The registration moves
    /// along with the name.
    pub fn add_name_observer(&self, name: &str, callback: NameObserverFn) -> u64 {
        let id = self.next_observer_id.get() + 1;
        self.next_observer_id.set(id);
        self.observers.borrow_mut().push(NameObserver {
            id,
            name: name.to_owned(),
            callback,
        });
        id
    }

    pub fn remove_name_observer(&self, id: u64) {
        self.observers.borrow_mut().retain(|observer| observer.id != id);
    }

    #[must_use]
    pub fn observer_count(&self, name: &str) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|observer| observer.name == name)
            .count()
    }

    /// Moves `old` to `new` and notifies the observers of `old`.
    ///
    /// Observers may unregister or register during the notification.
    /// Whatever is still registered for `old` afterwards is re-keyed to
    /// `new`. An empty `new` only erases `old`; its observers stay
    /// registered so references wake up again if the name comes back.
    pub fn name_changed(&self, old: &str, new: &str) {
        if !old.is_empty() {
            self.erase(old);
        }
        if new.is_empty() {
            return;
        }
        if !self.insert(new) {
            log::warn!("Namespace: name '{new}' is already registered");
        }
        if old.is_empty() || old == new {
            return;
        }

        let pending: Vec<(u64, NameObserverFn)> = self
            .observers
            .borrow()
            .iter()
            .filter(|observer| observer.name == old)
            .map(|observer| (observer.id, observer.callback.clone()))
            .collect();

        for (id, callback) in pending {
            let registered = self.observers.borrow().iter().any(|observer| observer.id == id);
            if registered {
                callback(new);
            }
        }

        for observer in self.observers.borrow_mut().iter_mut() {
            if observer.name == old {
                new.clone_into(&mut observer.name);
            }
        }
    }

    /// All names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names.borrow().sorted()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }

    /// Prepares the name trackers of a cloned subgraph for insertion.
    ///
    /// The trackers must not be connected to any namespace. They are first
    /// connected to a temporary namespace of their own, so references
    /// between the cloned entities are live. Every cloned name already used
    /// in `self` is then renamed to a name free in both namespaces, which
    /// rewrites the references inside the clone. Nothing is inserted into
    /// `self`; the caller connects the trackers afterwards.
    pub fn merge_cloned_names(&self, trackers: &[Rc<NameTracker>]) {
        let foreign = Namespace::new();
        for tracker in trackers {
            tracker.connect(&foreign);
        }

        let mut all_names = self.names.borrow().clone();
        all_names.merge(&foreign.names.borrow());

        for tracker in trackers {
            let name = tracker.name();
            if name.is_empty() {
                continue;
            }
            if self.name_exists(&name) {
                let unique = all_names.insert_unique(&name);
                log::debug!("Namespace: renaming pasted entity '{name}' to '{unique}'");
                tracker.change_name(&unique);
            } else {
                all_names.insert(&name);
            }
        }

        for tracker in trackers {
            tracker.disconnect(&foreign);
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("names", &self.names())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observers_follow_the_name() {
        let namespace = Namespace::new();
        namespace.insert("door_1");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        namespace.add_name_observer("door_1", Rc::new(move |name: &str| sink.borrow_mut().push(name.to_owned())));

        namespace.name_changed("door_1", "door_2");
        namespace.name_changed("door_2", "door_3");

        assert_eq!(*seen.borrow(), ["door_2", "door_3"]);
        assert!(!namespace.name_exists("door_1"));
        assert!(namespace.name_exists("door_3"));
        assert_eq!(namespace.observer_count("door_3"), 1);
    }

    #[test]
    fn observer_may_unregister_during_notification() {
        let namespace = Namespace::new();
        namespace.insert("a");
        let weak = Rc::downgrade(&namespace);
        let id = Rc::new(Cell::new(0));
        let own_id = id.clone();
        id.set(namespace.add_name_observer(
            "a",
            Rc::new(move |_: &str| {
                if let Some(namespace) = weak.upgrade() {
                    namespace.remove_name_observer(own_id.get());
                }
            }),
        ));

        namespace.name_changed("a", "b");
        assert_eq!(namespace.observer_count("a"), 0);
        assert_eq!(namespace.observer_count("b"), 0);
    }

    #[test]
    fn erased_name_keeps_observers() {
        let namespace = Namespace::new();
        namespace.insert("a");
        namespace.add_name_observer("a", Rc::new(|_: &str| {}));
        namespace.name_changed("a", "");
        assert!(namespace.is_empty());
        assert_eq!(namespace.observer_count("a"), 1);
    }
}
