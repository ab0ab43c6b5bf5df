//! In-memory storage implementation for document stores.
//!
//! Documents are kept as normalized field maps in insertion-ordered maps, one per
//! collection, behind a read-write lock. Every write normalizes its payload first,
//! then applies it under a single lock acquisition, so no partial write is ever
//! observable. Writes to a collection with listeners are reported to the
//! [`notify`](crate::notify) engine while the lock is still held.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bson::Document as BsonDocument;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::runtime::Handle;
use uuid::Uuid;

use docmem_core::{
    document::{ChangeType, DocumentChange, DocumentSnapshot, QuerySnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    value::{Map, Value, normalize_document},
};

use crate::{
    collection::Collection,
    notify::{Notifier, SnapshotStream, Subscription},
    query::Query,
};

type CollectionMap = IndexMap<String, Map>;
type StoreMap = HashMap<String, CollectionMap>;

/// Options for [`InMemoryStore::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge the fields into an existing document instead of replacing it.
    pub merge: bool,
}

impl SetOptions {
    /// Options for a field-level merge into an existing document.
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// Thread-safe in-memory document store.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be shared freely. Multiple clones of the same instance share the same
/// underlying data and listeners.
///
/// CRUD and queries are synchronous and never suspend. Listening for changes
/// requires a tokio runtime, which delivers snapshots on a later scheduling turn.
///
/// # Example
///
/// ```ignore
/// use docmem_memory::{InMemoryStore, SetOptions};
/// use bson::doc;
///
/// let store = InMemoryStore::builder().build();
///
/// store.put("users", "alice", &doc! { "name": "Alice", "age": 30 }, SetOptions::default())?;
/// store.patch("users", "alice", &doc! { "age": 31 })?;
///
/// let adults = store.query("users").filter("age", ">=", 18)?.get()?;
/// assert_eq!(adults.size(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// The main storage map: collection_name -> (document_id -> fields)
    collections: RwLock<StoreMap>,
    notifier: Notifier,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InMemoryStore {
    /// Creates a new empty store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns a handle to the named collection.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(name.to_string(), self.clone())
    }

    /// Starts a query over the named collection.
    ///
    /// An empty name yields a query that is not scoped to any collection; every
    /// operation on it fails with [`DocumentStoreError::NotCollectionScoped`].
    pub fn query(&self, collection: &str) -> Query {
        let scope = (!collection.is_empty()).then(|| collection.to_string());
        Query::new(self.clone(), scope)
    }

    /// Returns the stored fields of a document as an object value, or `None` if the
    /// collection or the document does not exist.
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.inner
            .collections
            .read()
            .get(collection)?
            .get(id)
            .map(|fields| Value::Object(fields.clone()))
    }

    /// Same as [`InMemoryStore::get`], wrapped in a snapshot.
    pub fn get_document(&self, collection: &str, id: &str) -> Option<DocumentSnapshot> {
        self.inner
            .collections
            .read()
            .get(collection)?
            .get(id)
            .map(|fields| DocumentSnapshot::new(id, fields.clone()))
    }

    /// Writes a document, creating the collection if needed.
    ///
    /// Without `merge` the document is replaced wholesale. With `merge`, an existing
    /// document receives a shallow field merge as in [`InMemoryStore::patch`]; a
    /// missing one is created.
    ///
    /// # Errors
    ///
    /// Returns a normalization error if `data` cannot be stored; nothing is written.
    pub fn put(
        &self,
        collection: &str,
        id: &str,
        data: &BsonDocument,
        options: SetOptions,
    ) -> DocumentStoreResult<()> {
        let fields = normalize_document(data)?;
        let mut store = self.inner.collections.write();
        let documents = store.entry(collection.to_string()).or_default();

        let change = match documents.get_mut(id) {
            Some(existing) if options.merge => {
                merge_fields(existing, fields);
                ChangeType::Modified
            }
            Some(existing) => {
                *existing = fields;
                ChangeType::Modified
            }
            None => {
                documents.insert(id.to_string(), fields);
                ChangeType::Added
            }
        };

        log::debug!("Set {}/{} ({}, merge: {})", collection, id, change, options.merge);
        self.publish(collection, documents, id, change, None);

        Ok(())
    }

    /// Merges fields into an existing document. Each top-level key in `data`
    /// overwrites the stored one; other keys are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if the document does not exist,
    /// or a normalization error if `data` cannot be stored.
    pub fn patch(&self, collection: &str, id: &str, data: &BsonDocument) -> DocumentStoreResult<()> {
        let fields = normalize_document(data)?;
        let mut store = self.inner.collections.write();

        let documents = store
            .get_mut(collection)
            .filter(|documents| documents.contains_key(id))
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        if let Some(existing) = documents.get_mut(id) {
            merge_fields(existing, fields);
        }

        log::debug!("Updated {}/{}", collection, id);
        self.publish(collection, documents, id, ChangeType::Modified, None);

        Ok(())
    }

    /// Deletes a document. Deleting a missing document is a no-op.
    pub fn remove(&self, collection: &str, id: &str) {
        let mut store = self.inner.collections.write();

        let Some(documents) = store.get_mut(collection) else {
            return;
        };

        if let Some(removed) = documents.shift_remove(id) {
            log::debug!("Deleted {}/{}", collection, id);
            self.publish(collection, documents, id, ChangeType::Removed, Some(removed));
        }
    }

    /// Creates a document with a generated ID and returns the ID.
    ///
    /// # Errors
    ///
    /// Returns a normalization error if `data` cannot be stored.
    pub fn add(&self, collection: &str, data: &BsonDocument) -> DocumentStoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.put(collection, &id, data, SetOptions::default())?;

        Ok(id)
    }

    /// Lists the names of collections holding at least one document.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names = self
            .inner
            .collections
            .read()
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        names.sort();
        names
    }

    /// Atomically replaces all stored data with an empty store.
    ///
    /// Listener registrations are kept and no change notifications are emitted.
    pub fn clear_data(&self) {
        let mut store = self.inner.collections.write();
        *store = StoreMap::new();

        log::info!("Cleared all collections");
    }

    /// Registers a listener on a collection.
    ///
    /// If the collection holds documents, the listener first receives them all as
    /// `added` changes. After that, every write to the collection delivers a snapshot
    /// of the whole collection with a single change record for the written document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if no tokio runtime is available.
    pub fn subscribe<F>(&self, collection: &str, listener: F) -> DocumentStoreResult<Subscription>
    where
        F: Fn(QuerySnapshot) + Send + Sync + 'static,
    {
        // Held across registration so no write slips between the initial snapshot
        // and the listener becoming visible.
        let store = self.inner.collections.read();
        let existing = store
            .get(collection)
            .map(snapshot_docs)
            .unwrap_or_default();

        self.inner
            .notifier
            .subscribe(collection, Arc::new(listener), existing)
    }

    /// Like [`InMemoryStore::subscribe`], but yields snapshots as a stream.
    /// Dropping the stream unsubscribes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if no tokio runtime is available.
    pub fn snapshots(&self, collection: &str) -> DocumentStoreResult<SnapshotStream> {
        let (sender, receiver) = futures::channel::mpsc::unbounded();
        let subscription = self.subscribe(collection, move |snapshot| {
            let _ = sender.unbounded_send(snapshot);
        })?;

        Ok(SnapshotStream::new(receiver, subscription))
    }

    /// Copies the current content of a collection, empty if it does not exist.
    pub(crate) fn collection_documents(&self, collection: &str) -> IndexMap<String, Map> {
        self.inner
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn publish(
        &self,
        collection: &str,
        documents: &CollectionMap,
        id: &str,
        change: ChangeType,
        removed: Option<Map>,
    ) {
        let notifier = &self.inner.notifier;

        if !notifier.has_listeners(collection) {
            return;
        }

        let fields = match removed {
            Some(fields) => fields,
            None => documents.get(id).cloned().unwrap_or_default(),
        };

        notifier.publish(
            collection,
            || snapshot_docs(documents),
            DocumentChange::new(change, DocumentSnapshot::new(id, fields)),
        );
    }
}

fn merge_fields(existing: &mut Map, fields: Map) {
    for (key, value) in fields {
        existing.insert(key, value);
    }
}

fn snapshot_docs(documents: &CollectionMap) -> Vec<DocumentSnapshot> {
    documents
        .iter()
        .map(|(id, fields)| DocumentSnapshot::new(id.clone(), fields.clone()))
        .collect()
}

/// Store settings that can be loaded from configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Debounce delay between the last change and the listener flush, in milliseconds.
    pub flush_delay_ms: u64,
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use docmem_memory::InMemoryStore;
///
/// let store = InMemoryStore::builder()
///     .flush_delay(Duration::from_millis(5))
///     .runtime(tokio::runtime::Handle::current())
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    flush_delay: Duration,
    runtime: Option<Handle>,
}

impl InMemoryStoreBuilder {
    /// Sets the delay between the last enqueued change and the flush that delivers it.
    /// Zero, the default, flushes on the next scheduling turn.
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Sets the runtime used to deliver change notifications.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Applies settings from a [`StoreConfig`].
    pub fn config(self, config: &StoreConfig) -> Self {
        self.flush_delay(Duration::from_millis(config.flush_delay_ms))
    }

    /// Builds the store. Without an explicit runtime, the runtime current at this
    /// point (if any) is captured.
    pub fn build(self) -> InMemoryStore {
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        InMemoryStore {
            inner: Arc::new(StoreInner {
                collections: RwLock::new(StoreMap::new()),
                notifier: Notifier::new(self.flush_delay, runtime),
            }),
        }
    }
}
