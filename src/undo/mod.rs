//! Undo System
//!
//! Undo works by snapshots: before an undoable object changes its committed
//! state it hands the [`UndoRecorder`] a closure that exports the current
//! state. The first snapshot of each object per operation wins, so any
//! number of edits between [`UndoSystem::start`] and [`UndoSystem::finish`]
//! collapse into a single undo step.
//!
//! Restoring imports the snapshot back into the object, which re-fires the
//! same change notifications a live edit would. Child lists of scene nodes
//! are restored by the map root because they need arena access; see
//! [`UndoTarget::Children`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use glam::DVec3;
use smallvec::SmallVec;

use crate::scene::NodeHandle;

/// A captured state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoMemento {
    /// Ordered key/value pairs of an entity.
    KeyValues(Vec<(String, String)>),
    /// Child handles of a node, in order.
    Children(Vec<NodeHandle>),
    /// Committed points of a primitive.
    Points(Vec<DVec3>),
}

/// An object whose state can be exported and re-imported.
pub trait Undoable {
    fn export_state(&self) -> UndoMemento;
    fn import_state(&self, memento: &UndoMemento);
}

/// Where a snapshot is restored to.
#[derive(Clone)]
pub enum UndoTarget {
    Object(Weak<dyn Undoable>),
    Children(NodeHandle),
}

impl UndoTarget {
    /// Whether both targets restore into the same object or child list.
    ///
    /// Objects compare by allocation. A snapshot keeps its `Weak`, so the
    /// allocation cannot be reused by another object while the snapshot
    /// exists.
    #[must_use]
    pub fn is_same(&self, other: &UndoTarget) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Weak::ptr_eq(a, b),
            (Self::Children(a), Self::Children(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for UndoTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(_) => f.write_str("Object"),
            Self::Children(node) => f.debug_tuple("Children").field(node).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoSnapshot {
    pub target: UndoTarget,
    pub memento: UndoMemento,
}

/// One undo step. Most edits touch one or two objects.
#[derive(Debug, Clone, Default)]
pub struct UndoOperation {
    pub name: String,
    pub snapshots: SmallVec<[UndoSnapshot; 2]>,
}

/// Collects snapshots for the operation in progress.
///
/// Shared by `Rc` between the [`UndoSystem`] and every undoable object that
/// belongs to the same map; objects only keep a `Weak` to it.
#[derive(Debug, Default)]
pub struct UndoRecorder {
    pending: RefCell<Option<UndoOperation>>,
}

impl UndoRecorder {
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Records the state of `target` unless it was already saved in this
    /// operation. Outside of an operation the call is ignored.
    pub fn save(&self, target: UndoTarget, export: impl FnOnce() -> UndoMemento) {
        let mut pending = self.pending.borrow_mut();
        let Some(operation) = pending.as_mut() else {
            log::debug!("Undo: state change outside of an undoable operation is not recorded");
            return;
        };
        if operation.snapshots.iter().any(|snapshot| snapshot.target.is_same(&target)) {
            return;
        }
        operation.snapshots.push(UndoSnapshot {
            target,
            memento: export(),
        });
    }

    fn begin(&self) {
        *self.pending.borrow_mut() = Some(UndoOperation::default());
    }

    fn take(&self) -> Option<UndoOperation> {
        self.pending.borrow_mut().take()
    }
}

/// Per-map undo and redo stacks.
#[derive(Debug)]
pub struct UndoSystem {
    recorder: Rc<UndoRecorder>,
    undo_stack: VecDeque<UndoOperation>,
    redo_stack: Vec<UndoOperation>,
    levels: usize,
}

impl UndoSystem {
    #[must_use]
    pub fn new(levels: usize) -> Self {
        Self {
            recorder: Rc::new(UndoRecorder::default()),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            levels: levels.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn recorder(&self) -> &Rc<UndoRecorder> {
        &self.recorder
    }

    #[inline]
    #[must_use]
    pub fn is_operation_active(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Opens a new operation. A still open operation is finished first.
    pub fn start(&mut self) {
        if self.recorder.is_recording() {
            log::warn!("Undo: starting an operation while another is open, finishing the open one");
            self.finish("unnamedCommand");
        }
        self.redo_stack.clear();
        self.recorder.begin();
    }

    /// Closes the open operation. Operations that recorded nothing are
    /// dropped.
    pub fn finish(&mut self, name: &str) {
        let Some(mut operation) = self.recorder.take() else {
            log::warn!("Undo: finish({name}) called without an open operation");
            return;
        };
        if operation.snapshots.is_empty() {
            log::debug!("Undo: discarding empty operation {name}");
            return;
        }
        operation.name = name.to_owned();
        self.undo_stack.push_back(operation);
        while self.undo_stack.len() > self.levels {
            self.undo_stack.pop_front();
        }
        log::debug!("Undo: recorded {name}");
    }

    /// Discards the open operation without touching any state.
    pub fn cancel(&mut self) {
        if self.recorder.take().is_none() {
            log::debug!("Undo: cancel called without an open operation");
        }
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.recorder.take();
    }

    pub fn set_levels(&mut self, levels: usize) {
        self.levels = levels.max(1);
        while self.undo_stack.len() > self.levels {
            self.undo_stack.pop_front();
        }
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Names of the undoable operations, most recent last.
    pub fn undo_names(&self) -> impl Iterator<Item = &str> {
        self.undo_stack.iter().map(|operation| operation.name.as_str())
    }

    /// Handles referenced by any recorded child-list snapshot.
    pub(crate) fn referenced_nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|operation| operation.snapshots.iter())
            .flat_map(|snapshot| {
                let handles: &[NodeHandle] = match (&snapshot.target, &snapshot.memento) {
                    (UndoTarget::Children(_), UndoMemento::Children(children)) => children,
                    _ => &[],
                };
                handles.iter().copied()
            })
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoOperation> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<UndoOperation> {
        self.redo_stack.pop()
    }

    pub(crate) fn push_redo(&mut self, operation: UndoOperation) {
        self.redo_stack.push(operation);
    }

    pub(crate) fn push_undo(&mut self, operation: UndoOperation) {
        self.undo_stack.push_back(operation);
        while self.undo_stack.len() > self.levels {
            self.undo_stack.pop_front();
        }
    }
}

impl Default for UndoSystem {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_UNDO_LEVELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_outside_operation_are_ignored() {
        let system = UndoSystem::default();
        system.recorder().save(UndoTarget::Children(NodeHandle::default()), || {
            UndoMemento::Children(Vec::new())
        });
        assert_eq!(system.undo_len(), 0);
    }

    #[test]
    fn first_snapshot_per_object_wins() {
        let mut system = UndoSystem::default();
        system.start();
        for value in ["a", "b"] {
            system.recorder().save(UndoTarget::Children(NodeHandle::default()), || {
                UndoMemento::KeyValues(vec![("k".to_owned(), value.to_owned())])
            });
        }
        system.finish("edit");
        let operation = system.pop_undo().expect("operation recorded");
        assert_eq!(operation.snapshots.len(), 1);
        assert_eq!(
            operation.snapshots[0].memento,
            UndoMemento::KeyValues(vec![("k".to_owned(), "a".to_owned())])
        );
    }

    struct Counter(RefCell<Vec<(String, String)>>);

    impl Undoable for Counter {
        fn export_state(&self) -> UndoMemento {
            UndoMemento::KeyValues(self.0.borrow().clone())
        }

        fn import_state(&self, memento: &UndoMemento) {
            if let UndoMemento::KeyValues(pairs) = memento {
                *self.0.borrow_mut() = pairs.clone();
            }
        }
    }

    fn object(counter: &Rc<Counter>) -> UndoTarget {
        let weak: Weak<dyn Undoable> = Rc::<Counter>::downgrade(counter);
        UndoTarget::Object(weak)
    }

    #[test]
    fn objects_are_told_apart_by_allocation() {
        let first = Rc::new(Counter(RefCell::new(Vec::new())));
        let second = Rc::new(Counter(RefCell::new(Vec::new())));
        assert!(object(&first).is_same(&object(&first)));
        assert!(!object(&first).is_same(&object(&second)));
        assert!(!object(&first).is_same(&UndoTarget::Children(NodeHandle::default())));

        // Two independent systems, as two open maps would have.
        let mut systems = [UndoSystem::default(), UndoSystem::default()];
        for system in &mut systems {
            system.start();
            for counter in [&first, &second, &first] {
                system.recorder().save(object(counter), || counter.export_state());
            }
            system.finish("edit");
        }
        for system in &mut systems {
            let operation = system.pop_undo().expect("operation recorded");
            assert_eq!(operation.snapshots.len(), 2);
        }
    }

    #[test]
    fn empty_operations_are_discarded_and_levels_bounded() {
        let mut system = UndoSystem::new(2);
        system.start();
        system.finish("nothing");
        assert_eq!(system.undo_len(), 0);

        for name in ["one", "two", "three"] {
            system.start();
            system.recorder().save(UndoTarget::Children(NodeHandle::default()), || {
                UndoMemento::Children(Vec::new())
            });
            system.finish(name);
        }
        assert_eq!(system.undo_names().collect::<Vec<_>>(), ["two", "three"]);
    }
}
