//! Mutable reactive value holder.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::derived::CycleError;
use super::runtime::{self, Freshness, NodeId, Source, Subscriber, Subscribers};

struct CellInner<T> {
    id: NodeId,
    value: RefCell<T>,
    version: Flag<u64>,
    subscribers: Subscribers,
}

impl<T: 'static> Source for CellInner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn subscribe(&self, subscriber: Weak<dyn Subscriber>) {
        self.subscribers.add(subscriber);
    }

    fn unsubscribe(&self, subscriber: NodeId) {
        self.subscribers.remove(subscriber);
    }

    fn refresh(&self) -> Result<(), CycleError> {
        Ok(())
    }
}

/// A mutable holder that notifies dependents when its value changes.
///
/// Cloning a `Cell` yields another handle to the same value.
pub struct Cell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Cell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: runtime::next_node_id(),
                value: RefCell::new(initial),
                version: Flag::new(0),
                subscribers: Subscribers::default(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Read the value, registering a dependency with the active evaluator.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the value for the duration of `f`, registering a dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Read without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value. Returns `false` when `value` equals the current one,
    /// in which case nothing is notified.
    ///
    /// # Panics
    ///
    /// Panics when called while a derived value is evaluating.
    pub fn set(&self, value: T) -> bool {
        if runtime::is_deriving() {
            panic!(
                "cell {} written while a derived value was evaluating",
                self.inner.id
            );
        }
        if *self.inner.value.borrow() == value {
            return false;
        }
        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(self.inner.version.get() + 1);
        runtime::batch(|| self.inner.subscribers.notify(Freshness::Dirty));
        true
    }

    /// Modify a copy of the value and store it if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next)
    }

    /// Number of writes that changed the value.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of live dependents.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    fn track(&self) {
        let source: Rc<dyn Source> = self.inner.clone();
        runtime::track(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_equal_value_is_noop() {
        let cell = Cell::new(3);
        assert!(!cell.set(3));
        assert_eq!(cell.version(), 0);
        assert!(cell.set(4));
        assert_eq!(cell.version(), 1);
        assert_eq!(cell.get(), 4);
    }

    #[test]
    fn update_modifies_copy() {
        let cell = Cell::new(vec![1, 2]);
        assert!(cell.update(|v| v.push(3)));
        assert_eq!(cell.get(), vec![1, 2, 3]);
        assert!(!cell.update(|_| {}));
    }

    #[test]
    fn clones_share_value() {
        let a = Cell::new("x".to_string());
        let b = a.clone();
        b.set("y".to_string());
        assert_eq!(a.get(), "y");
        assert_eq!(a.id(), b.id());
    }
}
