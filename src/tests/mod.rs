//! Crate-level tests: the HTTP API, the SQLite store and view-model
//! scenarios driven through an in-memory store.


mod api;
mod sqlite_store;
