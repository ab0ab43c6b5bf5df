//! Error types and result types for document store operations.
//!
//! Every fallible operation in the store, the query engine and the value model
//! reports through [`DocumentStoreError`]. Use [`DocumentStoreResult<T>`] as the
//! return type for fallible operations.
//!
//! Missing data is never an error: reading an absent document or collection
//! yields an empty result, and a predicate on a missing field evaluates to `false`.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// The document holds unassigned (undefined) values. Carries every offending field path.
    #[error("Document contains unassigned field values: {}", .0.join(" "))]
    ContainsUnassignedField(Vec<String>),
    /// The document holds an array directly inside another array.
    #[error("Document contains a nested array at {0}")]
    NestedArray(String),
    /// A raw value of a type the value model cannot store.
    /// The first argument is the field path, the second the offending type.
    #[error("Unsupported value of type {1} at {0}")]
    UnsupportedValue(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The filter operator is not part of the operator catalog.
    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),
    /// A list operator received something other than an array of 1 to 10 values.
    #[error("The '{0}' filter operator requires an array of 1 to 10 values")]
    InvalidOperandCardinality(String),
    /// A Timestamp field was compared against a value that is not a date.
    #[error("Field {0} holds a timestamp and can only be compared against a date")]
    TimestampComparisonRequiresDate(String),
    /// A query builder argument was malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A query operation was invoked without a bound collection.
    #[error("Query is not scoped to a collection")]
    NotCollectionScoped,
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The store could not set up a required resource, such as the async runtime
    /// used to deliver change notifications.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
