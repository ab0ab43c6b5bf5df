//! Snapshot and change-record types produced by reads, queries and listeners.
//!
//! A [`QuerySnapshot`] is fixed at materialization time and never observes later
//! writes. Snapshots delivered to listeners additionally carry the
//! [`DocumentChange`] records describing what caused the delivery.

use std::fmt;

use bson::{Bson, de::deserialize_from_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::DocumentStoreResult,
    value::{Map, Value, map_to_bson},
};

/// A single document as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSnapshot {
    id: String,
    data: Map,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Map) -> Self {
        Self { id: id.into(), data }
    }

    /// Returns the document ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the document fields.
    pub fn data(&self) -> &Map {
        &self.data
    }

    /// Returns a single top-level field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn into_data(self) -> Map {
        self.data
    }

    /// Converts the document fields into a BSON document.
    pub fn to_bson(&self) -> bson::Document {
        map_to_bson(&self.data)
    }

    /// Deserializes the document fields into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](crate::error::DocumentStoreError::Serialization)
    /// if the fields do not match the shape of `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.to_bson()))?)
    }
}

/// The kind of mutation a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Removed => "removed",
        })
    }
}

/// One mutation's effect on one document.
///
/// For `Removed` changes the snapshot holds the document as it was right before removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChange {
    #[serde(rename = "type")]
    change_type: ChangeType,
    doc: DocumentSnapshot,
}

impl DocumentChange {
    pub fn new(change_type: ChangeType, doc: DocumentSnapshot) -> Self {
        Self { change_type, doc }
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn doc(&self) -> &DocumentSnapshot {
        &self.doc
    }
}

/// An ordered, immutable set of documents, optionally annotated with change records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuerySnapshot {
    docs: Vec<DocumentSnapshot>,
    changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    /// Creates a snapshot without change records, as produced by a query.
    pub fn new(docs: Vec<DocumentSnapshot>) -> Self {
        Self { docs, changes: Vec::new() }
    }

    /// Creates a snapshot carrying change records, as delivered to listeners.
    pub fn with_changes(docs: Vec<DocumentSnapshot>, changes: Vec<DocumentChange>) -> Self {
        Self { docs, changes }
    }

    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    /// Number of documents in the snapshot.
    pub fn size(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.docs.iter()
    }

    /// Change records that caused this snapshot. Empty for query results.
    pub fn doc_changes(&self) -> &[DocumentChange] {
        &self.changes
    }

    /// Looks up a document by ID.
    pub fn get(&self, id: &str) -> Option<&DocumentSnapshot> {
        self.docs.iter().find(|doc| doc.id() == id)
    }

    /// Document IDs in snapshot order.
    pub fn ids(&self) -> Vec<&str> {
        self.docs.iter().map(DocumentSnapshot::id).collect()
    }

    pub fn into_docs(self) -> Vec<DocumentSnapshot> {
        self.docs
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}
