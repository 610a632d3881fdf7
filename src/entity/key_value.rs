use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Callback invoked with the new value of an observed key.
pub type KeyCallback = Rc<dyn Fn(&str)>;

/// A single spawnarg value with its attached observers.
///
/// Observers run synchronously, in attach order, every time the value
/// changes. The list is snapshotted before notifying, so a callback may
/// attach or detach observers (or assign the value again) without
/// disturbing the notification in progress. Each observer is handed the
/// value current at the time it is called.
pub struct KeyValue {
    value: RefCell<String>,
    default: String,
    observers: RefCell<Vec<(u64, KeyCallback)>>,
    next_id: Cell<u64>,
}

impl KeyValue {
    /// `default` is the entity class value, reported to observers when the
    /// key goes away.
    #[must_use]
    pub fn new(value: &str, default: &str) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value.to_owned()),
            default: default.to_owned(),
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.value.borrow().clone()
    }

    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Sets the value; observers run only if it actually changed. Returns
    /// whether it did.
    pub fn assign(&self, value: &str) -> bool {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return false;
            }
            value.clone_into(&mut *current);
        }
        self.notify();
        true
    }

    /// Attaches `callback` and calls it right away with the current value.
    pub fn attach(&self, callback: KeyCallback) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observers.borrow_mut().push((id, callback.clone()));
        let value = self.get();
        callback(&value);
        id
    }

    /// Detaches the observer `id`. With `send_default` it receives the
    /// class default one last time, which resets helpers to the value an
    /// absent key implies.
    pub fn detach(&self, id: u64, send_default: bool) {
        let removed = {
            let mut observers = self.observers.borrow_mut();
            observers
                .iter()
                .position(|(observer, _)| *observer == id)
                .map(|index| observers.remove(index).1)
        };
        if let (Some(callback), true) = (removed, send_default) {
            callback(&self.default);
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn notify(&self) {
        let snapshot: Vec<(u64, KeyCallback)> = self.observers.borrow().clone();
        for (id, callback) in snapshot {
            let still_attached = self.observers.borrow().iter().any(|(observer, _)| *observer == id);
            if still_attached {
                let value = self.get();
                callback(&value);
            }
        }
    }
}

impl fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValue")
            .field("value", &*self.value.borrow())
            .field("default", &self.default)
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}
