use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Callback fired whenever a selectable flips its state.
pub type SelectionChangedFn = Rc<dyn Fn(&ObservedSelectable)>;

/// A selection flag that reports every change to its owner.
///
/// Component selectables (vertices, curve points, drag-plane faces) are
/// shared by `Rc` so a [`Selector`](super::Selector) can hold on to the
/// candidates it collected and select the winner afterwards.
pub struct ObservedSelectable {
    selected: Cell<bool>,
    on_changed: SelectionChangedFn,
}

impl ObservedSelectable {
    #[must_use]
    pub fn new(on_changed: SelectionChangedFn) -> Rc<Self> {
        Rc::new(Self {
            selected: Cell::new(false),
            on_changed,
        })
    }

    /// A selectable nobody listens to.
    #[must_use]
    pub fn detached() -> Rc<Self> {
        Self::new(Rc::new(|_: &ObservedSelectable| {}))
    }

    #[inline]
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected.get()
    }

    pub fn set_selected(&self, selected: bool) {
        if self.selected.replace(selected) != selected {
            (self.on_changed)(self);
        }
    }

    pub fn invert_selected(&self) {
        self.set_selected(!self.is_selected());
    }
}

impl fmt::Debug for ObservedSelectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedSelectable")
            .field("selected", &self.selected.get())
            .finish_non_exhaustive()
    }
}
