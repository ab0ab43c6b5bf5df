//! Convenient re-exports of commonly used types from docmem.
//!
//! ```ignore
//! use docmem::prelude::*;
//! ```

pub use docmem_core::{
    document::{ChangeType, DocumentChange, DocumentSnapshot, QuerySnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FieldOp, Filter, Predicate, SortDirection},
    value::{Map, Timestamp, Value, ValueKind, normalize, normalize_document, normalize_json},
};
pub use docmem_memory::{
    Collection, InMemoryStore, InMemoryStoreBuilder, Query, SetOptions, SnapshotStream,
    StoreConfig, Subscription,
};
