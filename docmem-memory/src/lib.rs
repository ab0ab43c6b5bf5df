//! In-memory document store with chainable queries and change listeners.
//!
//! This crate provides the storage engine of docmem: a thread-safe map of
//! collections to documents, a query builder evaluated against that map and a
//! notification engine that delivers collection snapshots to listeners.
//!
//! # Features
//!
//! - **Synchronous CRUD** - `get`, `put`, `patch`, `remove` and `add` never suspend
//! - **Validated input** - Payloads are normalized into typed values before they are stored
//! - **Chainable queries** - `filter`, `order_by`, `limit` and `offset` over a working set
//! - **Batched notifications** - Writes in the same scheduling turn are delivered in one flush pass
//!
//! # Quick Start
//!
//! ```ignore
//! use bson::doc;
//! use docmem_memory::{InMemoryStore, SetOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build();
//!
//!     let subscription = store.subscribe("users", |snapshot| {
//!         for change in snapshot.doc_changes() {
//!             println!("{} {}", change.change_type(), change.doc().id());
//!         }
//!     })?;
//!
//!     store.put("users", "alice", &doc! { "name": "Alice" }, SetOptions::default())?;
//!
//!     let snapshot = store.query("users").filter("name", "==", "Alice")?.get()?;
//!     assert_eq!(snapshot.size(), 1);
//!
//!     subscription.unsubscribe();
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmem_memory;

pub mod collection;
mod evaluator;
pub mod notify;
pub mod query;
pub mod store;

pub use collection::Collection;
pub use notify::{Listener, SnapshotStream, Subscription};
pub use query::Query;
pub use store::{InMemoryStore, InMemoryStoreBuilder, SetOptions, StoreConfig};

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    colog::init();
}
