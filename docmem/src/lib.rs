//! Main docmem crate providing an in-memory document store.
//!
//! This crate is the primary entry point for users of docmem. It re-exports the
//! core types and the in-memory engine from the sub-crates.
//!
//! # Features
//!
//! - **Typed values** - Raw BSON or JSON input is validated into a tagged [`value::Value`] model
//! - **Synchronous CRUD** - Create, read, merge and delete documents keyed by collection and ID
//! - **Chainable queries** - Filter, sort, limit and page through a collection
//! - **Change listeners** - Collection snapshots with per-document change records
//!
//! # Quick Start
//!
//! ```ignore
//! use docmem::prelude::*;
//! use docmem::bson::doc;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = InMemoryStore::builder().build();
//!     let users = store.collection("users");
//!
//!     // Listen for changes; the first delivery arrives after the writes below
//!     let subscription = users.subscribe(|snapshot| {
//!         println!("{} users, {} changes", snapshot.size(), snapshot.doc_changes().len());
//!     })?;
//!
//!     users.set("alice", &doc! { "name": "Alice", "age": 30 }, SetOptions::default())?;
//!     users.set("bob", &doc! { "name": "Bob", "age": 17 }, SetOptions::default())?;
//!
//!     let adults = users
//!         .filter("age", ">=", 18)?
//!         .order_by("name", "asc")?
//!         .get()?;
//!
//!     for doc in &adults {
//!         let user: User = doc.deserialize()?;
//!         println!("{} is {}", user.name, user.age);
//!     }
//!
//!     subscription.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! # Streams
//!
//! Listeners can also be consumed as a `futures::Stream`:
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut snapshots = store.snapshots("users")?;
//! while let Some(snapshot) = snapshots.next().await {
//!     println!("{:?}", snapshot.ids());
//! }
//! ```

pub mod prelude;

pub use docmem_core::{document, error, query, value};

// Re-export BSON and chrono types for convenience
pub use bson;
pub use chrono;

/// In-memory storage engine.
pub mod memory {
    pub use docmem_memory::{
        Collection, InMemoryStore, InMemoryStoreBuilder, Listener, Query, SetOptions,
        SnapshotStream, StoreConfig, Subscription,
    };
}
