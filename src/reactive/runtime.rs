//! Thread-local bookkeeping shared by cells, derived values and effects.
//!
//! The runtime owns three pieces of state:
//!
//! - a stack of active trackers; the top one receives every source read
//!   while a derived value or effect evaluates,
//! - the batch depth and the queue of effects waiting for the flush,
//! - a counter of derived evaluations in progress, used to reject writes
//!   from inside a derivation.

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::derived::CycleError;

/// Identity of a node in the reactive graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How far a node may lag behind its sources.
///
/// Ordered: `Clean < Check < Dirty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Freshness {
    /// Value is current.
    Clean,
    /// Some transitive source changed; a direct source may or may not have.
    Check,
    /// A direct source changed value.
    Dirty,
}

/// Something that can be read inside a tracked evaluation.
pub(crate) trait Source {
    fn id(&self) -> NodeId;
    fn subscribe(&self, subscriber: Weak<dyn Subscriber>);
    fn unsubscribe(&self, subscriber: NodeId);
    /// Bring the value up to date. Cells are always up to date.
    fn refresh(&self) -> Result<(), CycleError>;
}

/// Something that depends on sources and must hear about their changes.
pub(crate) trait Subscriber {
    fn id(&self) -> NodeId;
    fn mark(&self, freshness: Freshness);
}

/// An effect waiting in the flush queue.
pub(crate) trait Scheduled {
    fn run_if_stale(&self);
}

/// Ordered, duplicate-free list of weak subscribers.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<Vec<(NodeId, Weak<dyn Subscriber>)>>,
}

impl Subscribers {
    pub(crate) fn add(&self, subscriber: Weak<dyn Subscriber>) {
        let Some(live) = subscriber.upgrade() else {
            return;
        };
        let id = live.id();
        let mut entries = self.entries.borrow_mut();
        if !entries.iter().any(|(existing, _)| *existing == id) {
            entries.push((id, subscriber));
        }
    }

    pub(crate) fn remove(&self, id: NodeId) {
        self.entries.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Mark every live subscriber, pruning dropped ones.
    ///
    /// The list is copied first so subscribers may re-enter this node.
    pub(crate) fn notify(&self, freshness: Freshness) {
        let live: Vec<Rc<dyn Subscriber>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        for subscriber in live {
            subscriber.mark(freshness);
        }
    }
}

struct Tracker {
    subscriber: Option<Weak<dyn Subscriber>>,
    sources: Vec<Rc<dyn Source>>,
}

#[derive(Default)]
struct Runtime {
    next_id: Flag<u64>,
    trackers: RefCell<Vec<Tracker>>,
    batch_depth: Flag<usize>,
    flushing: Flag<bool>,
    pending: RefCell<Vec<Weak<dyn Scheduled>>>,
    deriving: Flag<usize>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

pub(crate) fn next_node_id() -> NodeId {
    RUNTIME.with(|rt| {
        let id = rt.next_id.get() + 1;
        rt.next_id.set(id);
        NodeId(id)
    })
}

/// Register `source` with the innermost tracker, if any.
pub(crate) fn track(source: Rc<dyn Source>) {
    let subscriber = RUNTIME.with(|rt| {
        let mut trackers = rt.trackers.borrow_mut();
        let tracker = trackers.last_mut()?;
        let subscriber = tracker.subscriber.clone()?;
        if tracker.sources.iter().any(|s| s.id() == source.id()) {
            return None;
        }
        tracker.sources.push(Rc::clone(&source));
        Some(subscriber)
    });
    if let Some(subscriber) = subscriber {
        source.subscribe(subscriber);
    }
}

/// Pops the tracker even if the evaluation unwinds.
struct TrackerGuard;

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| {
            rt.trackers.borrow_mut().pop();
        });
    }
}

/// Run `f` with `subscriber` as the active tracker and return what it read.
pub(crate) fn evaluate<R>(
    subscriber: Weak<dyn Subscriber>,
    f: impl FnOnce() -> R,
) -> (R, Vec<Rc<dyn Source>>) {
    RUNTIME.with(|rt| {
        rt.trackers.borrow_mut().push(Tracker {
            subscriber: Some(subscriber),
            sources: Vec::new(),
        })
    });
    let guard = TrackerGuard;
    let value = f();
    let sources = RUNTIME.with(|rt| {
        rt.trackers
            .borrow_mut()
            .last_mut()
            .map(|tracker| std::mem::take(&mut tracker.sources))
            .unwrap_or_default()
    });
    drop(guard);
    (value, sources)
}

/// Run `f` without registering any of its reads as dependencies.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| {
        rt.trackers.borrow_mut().push(Tracker {
            subscriber: None,
            sources: Vec::new(),
        })
    });
    let _guard = TrackerGuard;
    f()
}

struct DerivingGuard;

impl Drop for DerivingGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.deriving.set(rt.deriving.get().saturating_sub(1)));
    }
}

/// Run a derived computation, flagging that writes are forbidden meanwhile.
pub(crate) fn deriving<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.deriving.set(rt.deriving.get() + 1));
    let _guard = DerivingGuard;
    f()
}

pub(crate) fn is_deriving() -> bool {
    RUNTIME.with(|rt| rt.deriving.get() > 0)
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = RUNTIME.with(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth == 0
        });
        if outermost && !std::thread::panicking() {
            flush();
        }
    }
}

/// Defer effect delivery until `f` returns.
///
/// Cell values change immediately; effects scheduled by the writes run once
/// each when the outermost batch ends.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
    let _guard = BatchGuard;
    f()
}

/// Whether a batch scope is currently open.
pub fn in_batch() -> bool {
    RUNTIME.with(|rt| rt.batch_depth.get() > 0)
}

/// Queue an effect for the next flush.
///
/// Callers only schedule on a `Clean -> stale` transition, so an effect sits
/// in the queue at most once.
pub(crate) fn schedule(effect: Weak<dyn Scheduled>) {
    RUNTIME.with(|rt| rt.pending.borrow_mut().push(effect));
    if !in_batch() {
        flush();
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.flushing.set(false));
    }
}

fn flush() {
    let already = RUNTIME.with(|rt| rt.flushing.replace(true));
    if already {
        return;
    }
    let _guard = FlushGuard;
    loop {
        let queue = RUNTIME.with(|rt| std::mem::take(&mut *rt.pending.borrow_mut()));
        if queue.is_empty() {
            break;
        }
        tracing::trace!(effects = queue.len(), "flushing reactive effects");
        for effect in queue.iter().filter_map(Weak::upgrade) {
            effect.run_if_stale();
        }
    }
}
