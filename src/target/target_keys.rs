use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::entity::{KeyValue, SpawnArgsObserver, starts_with_ignore_case};

pub const TARGET_KEY_PREFIX: &str = "target";

/// The `target*` keys of one entity, in spawnarg order.
#[derive(Debug, Default)]
pub struct TargetKeyCollection {
    keys: RefCell<SmallVec<[(String, String); 2]>>,
}

impl TargetKeyCollection {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn is_target_key(key: &str) -> bool {
        starts_with_ignore_case(key, TARGET_KEY_PREFIX)
    }

    /// (key, target name) pairs with a non-empty target name.
    #[must_use]
    pub fn targets(&self) -> Vec<(String, String)> {
        self.keys
            .borrow()
            .iter()
            .filter(|(_, name)| !name.is_empty())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.borrow().iter().all(|(_, name)| name.is_empty())
    }

    /// The first of `target0`, `target1`, ... that is not set.
    #[must_use]
    pub fn next_free_key(&self) -> String {
        let keys = self.keys.borrow();
        (0..)
            .map(|index| format!("{TARGET_KEY_PREFIX}{index}"))
            .find(|candidate| !keys.iter().any(|(key, _)| key.eq_ignore_ascii_case(candidate)))
            .unwrap_or_else(|| TARGET_KEY_PREFIX.to_owned())
    }

    fn update(&self, key: &str, value: &str) {
        if let Some(entry) = self
            .keys
            .borrow_mut()
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
        {
            value.clone_into(&mut entry.1);
        }
    }
}

impl SpawnArgsObserver for TargetKeyCollection {
    fn on_key_insert(&self, key: &str, value: &Rc<KeyValue>) {
        if Self::is_target_key(key) {
            self.keys.borrow_mut().push((key.to_owned(), value.get()));
        }
    }

    fn on_key_change(&self, key: &str, value: &str) {
        if Self::is_target_key(key) {
            self.update(key, value);
        }
    }

    fn on_key_erase(&self, key: &str, _value: &Rc<KeyValue>) {
        if Self::is_target_key(key) {
            self.keys
                .borrow_mut()
                .retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
        }
    }
}
