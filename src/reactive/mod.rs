//! Reactive cells and derived values for view-state.
//!
//! - [`Cell`]: a mutable value that notifies dependents when it changes.
//! - [`Derived`]: a memoized computation over cells and other derived
//!   values, recomputed lazily on read.
//! - [`Effect`]: an eager observer, re-run after each flush in which one of
//!   its inputs changed.
//! - [`batch`]: defers effect delivery so several writes cause one pass.
//!
//! # Architecture
//!
//! Dependencies are tracked explicitly: evaluating a derived value or an
//! effect pushes a tracker onto a thread-local stack, and every cell or
//! derived value read while it is on top registers the evaluator as a
//! subscriber. Nothing hooks into a host framework.
//!
//! Invalidation is push-based and recomputation pull-based. A write marks
//! direct dependents `Dirty` and everything further downstream `Check`;
//! a `Check` node only recomputes if one of its sources actually produced a
//! different value.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the current one notifies nobody.
//! 2. A derived value is never recomputed without being read.
//! 3. Inside a batch each effect runs at most once, after the batch, and
//!    sees the final values of every write.
//! 4. Derived computations cannot write cells; a cell write during a
//!    derivation panics.
//! 5. A derived value that reads itself fails with [`CycleError`] instead
//!    of looping.
//! 6. An effect that writes a value it read runs again once its body has
//!    returned.
//!
//! The graph is single-threaded (`Rc`-based). Handles are neither `Send`
//! nor `Sync`.

mod cell;
mod derived;
mod effect;
mod runtime;

pub use cell::Cell;
pub use derived::{CycleError, Derived};
pub use effect::Effect;
pub use runtime::{batch, in_batch, untrack, NodeId};

/// Create a [`Cell`] holding `initial`.
pub fn cell<T: Clone + PartialEq + 'static>(initial: T) -> Cell<T> {
    Cell::new(initial)
}

/// Create a [`Derived`] value computed by `compute`.
pub fn derive<T: Clone + PartialEq + 'static>(compute: impl Fn() -> T + 'static) -> Derived<T> {
    Derived::new(compute)
}

/// Create an [`Effect`] running `body` now and after relevant changes.
pub fn effect(body: impl FnMut() + 'static) -> Effect {
    Effect::new(body)
}
