//! Targets
//!
//! Entities point at each other by name (`target`, `target1`, ...). Names
//! are resolved lazily through the map's [`TargetManager`]; a reference to
//! a name nobody carries simply resolves to nothing.

pub mod target_keys;

use std::cell::RefCell;

use rustc_hash::FxHashMap;

pub use target_keys::TargetKeyCollection;

use crate::scene::NodeHandle;

/// Name to node registry of one map. Only entities that are part of the
/// scene are registered.
#[derive(Debug, Default)]
pub struct TargetManager {
    targets: RefCell<FxHashMap<String, NodeHandle>>,
}

impl TargetManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associate(&self, name: &str, node: NodeHandle) {
        if name.is_empty() {
            return;
        }
        let previous = self.targets.borrow_mut().insert(name.to_owned(), node);
        if previous.is_some_and(|previous| previous != node) {
            log::debug!("TargetManager: '{name}' now resolves to {node:?}");
        }
    }

    /// Drops `name` if it still resolves to `node`.
    pub fn clear(&self, name: &str, node: NodeHandle) {
        let mut targets = self.targets.borrow_mut();
        if targets.get(name) == Some(&node) {
            targets.remove(name);
        }
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<NodeHandle> {
        self.targets.borrow().get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.borrow().is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn clear_only_removes_own_registration() {
        let mut arena: SlotMap<NodeHandle, ()> = SlotMap::with_key();
        let a = arena.insert(());
        let b = arena.insert(());

        let targets = TargetManager::new();
        targets.associate("door", a);
        targets.associate("door", b);
        targets.clear("door", a);
        assert_eq!(targets.resolve("door"), Some(b));
        targets.clear("door", b);
        assert!(targets.resolve("door").is_none());

        targets.associate("", a);
        assert!(targets.is_empty());
    }
}
