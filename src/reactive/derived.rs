//! Memoized, lazily recomputed values.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{self, Freshness, NodeId, Source, Subscriber, Subscribers};

/// A derived value was read while it was already evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleError {
    pub node: NodeId,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle through derived value {}", self.node)
    }
}

impl std::error::Error for CycleError {}

struct DerivedInner<T> {
    id: NodeId,
    this: Weak<DerivedInner<T>>,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    freshness: Flag<Freshness>,
    evaluating: Flag<bool>,
    sources: RefCell<Vec<Rc<dyn Source>>>,
    subscribers: Subscribers,
    recomputations: Flag<u64>,
}

struct EvaluatingGuard<'a>(&'a Flag<bool>);

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: Clone + PartialEq + 'static> DerivedInner<T> {
    fn update(&self) -> Result<(), CycleError> {
        if self.evaluating.get() {
            return Err(CycleError { node: self.id });
        }
        match self.freshness.get() {
            Freshness::Clean => return Ok(()),
            Freshness::Check => {
                let sources = self.sources.borrow().clone();
                for source in sources {
                    source.refresh()?;
                    if self.freshness.get() == Freshness::Dirty {
                        break;
                    }
                }
                if self.freshness.get() == Freshness::Check {
                    self.freshness.set(Freshness::Clean);
                    return Ok(());
                }
            }
            Freshness::Dirty => {}
        }
        self.recompute();
        Ok(())
    }

    fn recompute(&self) {
        let previous_sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in &previous_sources {
            source.unsubscribe(self.id);
        }

        self.evaluating.set(true);
        let guard = EvaluatingGuard(&self.evaluating);
        let subscriber: Weak<dyn Subscriber> = self.this.clone();
        let (value, sources) =
            runtime::evaluate(subscriber, || runtime::deriving(|| (self.compute)()));
        drop(guard);

        *self.sources.borrow_mut() = sources;
        self.recomputations.set(self.recomputations.get() + 1);
        self.freshness.set(Freshness::Clean);

        let changed = {
            let mut slot = self.value.borrow_mut();
            let had_value = slot.is_some();
            if slot.as_ref() == Some(&value) {
                false
            } else {
                *slot = Some(value);
                had_value
            }
        };
        if changed {
            self.subscribers.notify(Freshness::Dirty);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Source for DerivedInner<T> {
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
        self.update()
    }
}

impl<T: Clone + PartialEq + 'static> Subscriber for DerivedInner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn mark(&self, freshness: Freshness) {
        let previous = self.freshness.get();
        if freshness > previous {
            self.freshness.set(freshness);
        }
        if previous == Freshness::Clean {
            self.subscribers.notify(Freshness::Check);
        }
    }
}

/// A read-only value computed from cells and other derived values.
///
/// The computation runs on the first read and afterwards only when a value
/// it read during its last evaluation has changed. Writes upstream merely
/// mark it stale; the recomputation happens on the next read.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("cached", &*self.inner.value.borrow())
            .field("freshness", &self.inner.freshness.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|this| DerivedInner {
            id: runtime::next_node_id(),
            this: this.clone(),
            compute: Box::new(compute),
            value: RefCell::new(None),
            freshness: Flag::new(Freshness::Dirty),
            evaluating: Flag::new(false),
            sources: RefCell::new(Vec::new()),
            subscribers: Subscribers::default(),
            recomputations: Flag::new(0),
        });
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Current value, recomputing first if an input changed.
    ///
    /// # Panics
    ///
    /// Panics on a dependency cycle. Use [`Derived::try_get`] to observe it.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_get(&self) -> Result<T, CycleError> {
        self.inner.update()?;
        let source: Rc<dyn Source> = self.inner.clone();
        runtime::track(source);
        match self.inner.value.borrow().as_ref() {
            Some(value) => Ok(value.clone()),
            None => unreachable!("derived value {} has no value after update", self.inner.id),
        }
    }

    /// Current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        runtime::untrack(|| self.get())
    }

    /// How many times the computation has run.
    pub fn recomputations(&self) -> u64 {
        self.inner.recomputations.get()
    }

    /// Whether the next read will have to consult its sources.
    pub fn is_stale(&self) -> bool {
        self.inner.freshness.get() != Freshness::Clean
    }
}
