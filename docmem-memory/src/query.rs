//! Chainable queries over a collection.
//!
//! A [`Query`] holds a working set of documents. The first step that needs it
//! seeds the working set with a copy of the whole collection; every later step
//! narrows, reorders or truncates that copy. Writes to the store made after the
//! working set was seeded are not observed.

use bson::Bson;
use indexmap::IndexMap;

use docmem_core::{
    document::{DocumentSnapshot, QuerySnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Predicate, SortDirection},
    value::Map,
};

use crate::{
    evaluator::{CompiledPredicate, DocumentEvaluator, lookup, sort_order},
    store::InMemoryStore,
};

/// A query over a single collection.
///
/// ```ignore
/// let snapshot = store
///     .query("users")
///     .filter("age", ">=", 18)?
///     .order_by("name", "asc")?
///     .limit(10)?
///     .get()?;
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    store: InMemoryStore,
    collection: Option<String>,
    docs: Option<IndexMap<String, Map>>,
}

impl Query {
    pub(crate) fn new(store: InMemoryStore, collection: Option<String>) -> Self {
        Self {
            store,
            collection,
            docs: None,
        }
    }

    /// The collection this query is bound to, if any.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Keeps the documents for which `field op operand` holds.
    ///
    /// `op` is one of `==`, `!=`, `<`, `<=`, `>`, `>=`, `array-contains`,
    /// `array-contains-any`, `in` and `not-in`. Successive calls combine with AND.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidArgument`] if `field` or `op` is empty
    /// - [`DocumentStoreError::NotCollectionScoped`] if the query has no collection
    /// - [`DocumentStoreError::UnsupportedOperator`] for unknown operator names
    /// - [`DocumentStoreError::InvalidOperandCardinality`] for a bad list operand
    /// - [`DocumentStoreError::TimestampComparisonRequiresDate`] when a timestamp
    ///   field is compared against something that is not a date
    pub fn filter(self, field: &str, op: &str, operand: impl Into<Bson>) -> DocumentStoreResult<Self> {
        if field.is_empty() || op.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "filter requires a field name and an operator".to_string(),
            ));
        }

        self.scope()?;
        self.filter_by(Predicate::parse(field, op, operand)?)
    }

    /// Same as [`Query::filter`] with a prebuilt predicate.
    pub fn filter_by(mut self, predicate: Predicate) -> DocumentStoreResult<Self> {
        if predicate.field.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "filter requires a field name".to_string(),
            ));
        }

        self.scope()?;
        let predicate = CompiledPredicate::compile(&predicate)?;
        let docs = self.take_working_set()?;

        let docs = if docs.is_empty() {
            docs
        } else {
            DocumentEvaluator::filter_documents(docs, &predicate)?
        };

        log::trace!(
            "Filter on {} kept {} documents",
            predicate.field(),
            docs.len()
        );

        self.docs = Some(docs);
        Ok(self)
    }

    /// Sorts the working set by a field. `direction` must be `"asc"` or `"desc"`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] for any other direction, or
    /// [`DocumentStoreError::NotCollectionScoped`] if the query has no collection.
    pub fn order_by(self, field: &str, direction: &str) -> DocumentStoreResult<Self> {
        let direction = direction.parse::<SortDirection>()?;
        self.sort(field, direction)
    }

    /// Sorts the working set by a field.
    ///
    /// The ascending sort is stable. Documents missing the field come first in
    /// ascending order; values of different types are grouped by type. Descending
    /// order is the exact reverse of ascending order, ties included.
    pub fn sort(mut self, field: &str, direction: SortDirection) -> DocumentStoreResult<Self> {
        let mut docs = self.take_working_set()?;

        docs.sort_by(|_, left, _, right| sort_order(lookup(left, field), lookup(right, field)));

        if direction == SortDirection::Desc {
            docs.reverse();
        }

        self.docs = Some(docs);
        Ok(self)
    }

    /// Keeps at most `n` documents. Negative values keep none.
    pub fn limit(mut self, n: i64) -> DocumentStoreResult<Self> {
        let mut docs = self.take_working_set()?;
        docs.truncate(clamp(n));

        self.docs = Some(docs);
        Ok(self)
    }

    /// Skips the first `n` documents. Negative values skip none.
    pub fn offset(mut self, n: i64) -> DocumentStoreResult<Self> {
        let mut docs = self.take_working_set()?;
        let skip = clamp(n).min(docs.len());
        docs.drain(..skip);

        self.docs = Some(docs);
        Ok(self)
    }

    /// Materializes the working set.
    ///
    /// The seeded working set is kept, so calling `get` again returns the same
    /// documents even if the store changed in between.
    pub fn get(&mut self) -> DocumentStoreResult<QuerySnapshot> {
        let docs = self.take_working_set()?;
        let snapshot = QuerySnapshot::new(
            docs.iter()
                .map(|(id, fields)| DocumentSnapshot::new(id.clone(), fields.clone()))
                .collect(),
        );

        self.docs = Some(docs);
        Ok(snapshot)
    }

    fn scope(&self) -> DocumentStoreResult<&str> {
        self.collection
            .as_deref()
            .ok_or(DocumentStoreError::NotCollectionScoped)
    }

    fn take_working_set(&mut self) -> DocumentStoreResult<IndexMap<String, Map>> {
        if let Some(docs) = self.docs.take() {
            return Ok(docs);
        }

        let collection = self.scope()?;
        Ok(self.store.collection_documents(collection))
    }
}

fn clamp(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}
