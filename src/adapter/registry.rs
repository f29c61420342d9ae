use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::{Adapter, AdapterInner};
use crate::store::{FromSnapshot, Query, Store};

/// One adapter per distinct query.
///
/// Entries are weak: an adapter lives as long as some view-model holds it,
/// and a later lookup for the same query starts a fresh subscription.
pub struct AdapterRegistry {
    store: Rc<dyn Store>,
    entries: RefCell<HashMap<Query, Weak<dyn Any>>>,
}

impl AdapterRegistry {
    pub fn new(store: Rc<dyn Store>) -> Self {
        Self {
            store,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Rc<dyn Store> {
        &self.store
    }

    /// The adapter for `query`, or a skipped one for `None`.
    pub fn adapter<T>(&self, query: Option<Query>) -> Adapter<T>
    where
        T: FromSnapshot + Clone + PartialEq + 'static,
    {
        let Some(query) = query else {
            return Adapter::skipped();
        };

        let existing = self.entries.borrow().get(&query).and_then(Weak::upgrade);
        if let Some(existing) = existing {
            match existing.downcast::<AdapterInner<T>>() {
                Ok(inner) => return Adapter::from_inner(inner),
                Err(_) => warn!(%query, "query reused with a different value type"),
            }
        }

        debug!(%query, "subscribing");
        let adapter = Adapter::<T>::spawn(&*self.store, query.clone());
        let erased: Rc<dyn Any> = adapter.inner().clone();
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert(query, Rc::downgrade(&erased));
        adapter
    }

    /// Queries with a live adapter.
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
