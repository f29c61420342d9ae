//! External data adapters.
//!
//! An [`Adapter`] turns a push-based store subscription into a reactive cell
//! holding a [`QueryState`]. Only its [`AdapterFeed`] writes the cell; any
//! number of derived values read it.

mod registry;

pub use registry::AdapterRegistry;

use std::cell::{Cell as Flag, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::StreamExt;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::errors::AppError;
use crate::reactive::Cell;
use crate::store::{FromSnapshot, Query, Store};

/// Latest known value of an external source.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// No snapshot yet.
    Pending,
    Ready(T),
    Failed(AppError),
}

impl<T> QueryState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, QueryState::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            QueryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            QueryState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            QueryState::Pending => QueryState::Pending,
            QueryState::Ready(value) => QueryState::Ready(f(value)),
            QueryState::Failed(err) => QueryState::Failed(err),
        }
    }
}

impl<T> From<Result<T, AppError>> for QueryState<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => QueryState::Ready(value),
            Err(err) => QueryState::Failed(err),
        }
    }
}

pub(crate) struct AdapterInner<T> {
    query: Option<Query>,
    state: Cell<QueryState<T>>,
    snapshots: Flag<u64>,
    task: RefCell<Option<AbortHandle>>,
}

impl<T> Drop for AdapterInner<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
        if let Some(query) = &self.query {
            debug!(%query, "adapter dropped, subscription aborted");
        }
    }
}

/// Read side of an external source.
///
/// Clones share the same cell. Equality is identity.
pub struct Adapter<T> {
    inner: Rc<AdapterInner<T>>,
}

impl<T> Clone for Adapter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Adapter<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> fmt::Debug for Adapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("query", &self.inner.query)
            .field("snapshots", &self.inner.snapshots.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Adapter<T> {
    /// An adapter and the feed that writes it, with no subscription behind
    /// them.
    pub fn channel(query: Option<Query>) -> (Adapter<T>, AdapterFeed<T>) {
        let inner = Rc::new(AdapterInner {
            query,
            state: Cell::new(QueryState::Pending),
            snapshots: Flag::new(0),
            task: RefCell::new(None),
        });
        let feed = AdapterFeed {
            inner: Rc::downgrade(&inner),
        };
        (Adapter { inner }, feed)
    }

    /// The skip sentinel: never subscribes, stays `Pending`.
    pub fn skipped() -> Self {
        Self::channel(None).0
    }

    /// Subscribe to `query` and keep the cell current on a local task.
    ///
    /// Must be called inside a `tokio::task::LocalSet`.
    pub fn spawn(store: &dyn Store, query: Query) -> Self
    where
        T: FromSnapshot,
    {
        let (adapter, feed) = Self::channel(Some(query.clone()));
        let mut stream = store.watch(&query);
        let handle = tokio::task::spawn_local(async move {
            while let Some(item) = stream.next().await {
                let decoded = item.and_then(T::from_snapshot);
                if !feed.push(decoded) {
                    break;
                }
            }
            debug!(%query, "subscription ended");
        });
        *adapter.inner.task.borrow_mut() = Some(handle.abort_handle());
        adapter
    }

    /// Tracked read of the current state.
    pub fn get(&self) -> QueryState<T> {
        self.inner.state.get()
    }

    /// Tracked borrow of the current state.
    pub fn with<R>(&self, f: impl FnOnce(&QueryState<T>) -> R) -> R {
        self.inner.state.with(f)
    }

    pub fn get_untracked(&self) -> QueryState<T> {
        self.inner.state.get_untracked()
    }

    pub fn query(&self) -> Option<&Query> {
        self.inner.query.as_ref()
    }

    pub fn is_skipped(&self) -> bool {
        self.inner.query.is_none()
    }

    /// Snapshots pushed so far.
    pub fn snapshots(&self) -> u64 {
        self.inner.snapshots.get()
    }

    pub(crate) fn inner(&self) -> &Rc<AdapterInner<T>> {
        &self.inner
    }

    pub(crate) fn from_inner(inner: Rc<AdapterInner<T>>) -> Self {
        Self { inner }
    }
}

/// The single writer of an adapter's cell.
pub struct AdapterFeed<T> {
    inner: Weak<AdapterInner<T>>,
}

impl<T: Clone + PartialEq + 'static> AdapterFeed<T> {
    /// Write one snapshot. Returns `false` once the adapter is gone.
    pub fn push(&self, snapshot: Result<T, AppError>) -> bool {
        self.push_state(snapshot.into())
    }

    pub fn push_state(&self, state: QueryState<T>) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        inner.snapshots.set(inner.snapshots.get() + 1);
        if let QueryState::Failed(err) = &state {
            debug!(query = ?inner.query, error = %err, "source failed");
        }
        inner.state.set(state);
        true
    }

    pub fn is_connected(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Derived;

    #[test]
    fn test_push_updates_cell() {
        let (adapter, feed) = Adapter::<Vec<i32>>::channel(Some(Query::Topics));
        assert!(adapter.get().is_pending());

        assert!(feed.push(Ok(vec![1])));
        assert_eq!(adapter.get(), QueryState::Ready(vec![1]));

        assert!(feed.push(Err(AppError::Database("offline".into()))));
        assert_eq!(
            adapter.get().error(),
            Some(&AppError::Database("offline".into()))
        );
        assert_eq!(adapter.snapshots(), 2);
    }

    #[test]
    fn test_rows_follow_pushes_without_spurious_values() {
        let (adapter, feed) = Adapter::<Vec<&'static str>>::channel(Some(Query::Topics));
        let rows = {
            let adapter = adapter.clone();
            Derived::new(move || match adapter.get() {
                QueryState::Ready(items) => items.iter().map(|t| format!("row({t})")).collect(),
                _ => Vec::<String>::new(),
            })
        };
        let mut seen = vec![rows.get()];
        feed.push(Ok(vec![]));
        seen.push(rows.get());
        feed.push(Ok(vec!["t1", "t2"]));
        seen.push(rows.get());

        assert_eq!(
            seen,
            vec![
                vec![],
                vec![],
                vec!["row(t1)".to_string(), "row(t2)".to_string()]
            ]
        );
        assert_eq!(rows.recomputations(), 3);
    }

    #[test]
    fn test_feed_stops_after_adapter_dropped() {
        let (adapter, feed) = Adapter::<u8>::channel(None);
        assert!(feed.is_connected());
        drop(adapter);
        assert!(!feed.is_connected());
        assert!(!feed.push(Ok(1)));
    }

    #[test]
    fn test_skipped_adapter() {
        let adapter = Adapter::<u8>::skipped();
        assert!(adapter.is_skipped());
        assert!(adapter.get().is_pending());
        assert_ne!(adapter, Adapter::<u8>::skipped());
        assert_eq!(adapter, adapter.clone());
    }

    #[test]
    fn test_query_state_map() {
        let state: QueryState<Vec<u8>> = QueryState::Ready(vec![1, 2]);
        assert_eq!(state.map(|v| v.len()), QueryState::Ready(2));
        let failed: QueryState<u8> = Err(AppError::NotFound("x".into())).into();
        assert!(!failed.is_ready());
    }
}
