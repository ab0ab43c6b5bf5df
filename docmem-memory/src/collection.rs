//! Collection handles.
//!
//! A [`Collection`] binds a collection name to a store. It forwards document
//! operations to the store and starts [`Query`]s scoped to the collection.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docmem_memory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let users = store.collection("users");
//!
//! let id = users.add(&doc! { "name": "Alice" })?;
//! users.update(&id, &doc! { "age": 30 })?;
//!
//! let adults = users.filter("age", ">=", 18)?.get()?;
//! ```

use bson::{Bson, Document as BsonDocument};

use docmem_core::{
    document::{DocumentSnapshot, QuerySnapshot},
    error::DocumentStoreResult,
    query::{Predicate, SortDirection},
};

use crate::{
    notify::{SnapshotStream, Subscription},
    query::Query,
    store::{InMemoryStore, SetOptions},
};

/// A named collection within an [`InMemoryStore`].
///
/// Handles are cheap to clone. A handle to a collection with no documents is
/// valid; the collection comes into existence with its first write.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    store: InMemoryStore,
}

impl Collection {
    pub(crate) fn new(name: String, store: InMemoryStore) -> Self {
        Self { name, store }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// IDs of the documents currently in the collection, in insertion order.
    pub fn doc_ids(&self) -> Vec<String> {
        self.store.collection_documents(&self.name).into_keys().collect()
    }

    /// Creates a document with a generated ID and returns the ID.
    pub fn add(&self, data: &BsonDocument) -> DocumentStoreResult<String> {
        self.store.add(&self.name, data)
    }

    /// Fetches a single document.
    pub fn get(&self, id: &str) -> Option<DocumentSnapshot> {
        self.store.get_document(&self.name, id)
    }

    /// Writes a document, see [`InMemoryStore::put`].
    pub fn set(&self, id: &str, data: &BsonDocument, options: SetOptions) -> DocumentStoreResult<()> {
        self.store.put(&self.name, id, data, options)
    }

    /// Merges fields into an existing document, see [`InMemoryStore::patch`].
    pub fn update(&self, id: &str, data: &BsonDocument) -> DocumentStoreResult<()> {
        self.store.patch(&self.name, id, data)
    }

    pub fn delete(&self, id: &str) {
        self.store.remove(&self.name, id)
    }

    /// Starts a query over this collection.
    pub fn query(&self) -> Query {
        self.store.query(&self.name)
    }

    /// Shortcut for `query().filter(..)`.
    pub fn filter(&self, field: &str, op: &str, operand: impl Into<Bson>) -> DocumentStoreResult<Query> {
        self.query().filter(field, op, operand)
    }

    /// Shortcut for `query().filter_by(..)`.
    pub fn filter_by(&self, predicate: Predicate) -> DocumentStoreResult<Query> {
        self.query().filter_by(predicate)
    }

    /// Shortcut for `query().order_by(..)`.
    pub fn order_by(&self, field: &str, direction: &str) -> DocumentStoreResult<Query> {
        self.query().order_by(field, direction)
    }

    /// Shortcut for `query().sort(..)`.
    pub fn sort(&self, field: &str, direction: SortDirection) -> DocumentStoreResult<Query> {
        self.query().sort(field, direction)
    }

    /// Shortcut for `query().limit(..)`.
    pub fn limit(&self, n: i64) -> DocumentStoreResult<Query> {
        self.query().limit(n)
    }

    /// Snapshot of every document in the collection.
    pub fn get_all(&self) -> DocumentStoreResult<QuerySnapshot> {
        self.query().get()
    }

    /// Registers a listener, see [`InMemoryStore::subscribe`].
    pub fn subscribe<F>(&self, listener: F) -> DocumentStoreResult<Subscription>
    where
        F: Fn(QuerySnapshot) + Send + Sync + 'static,
    {
        self.store.subscribe(&self.name, listener)
    }

    /// Snapshot stream, see [`InMemoryStore::snapshots`].
    pub fn snapshots(&self) -> DocumentStoreResult<SnapshotStream> {
        self.store.snapshots(&self.name)
    }
}
