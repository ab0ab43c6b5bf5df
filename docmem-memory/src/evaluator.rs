//! Predicate evaluation for in-memory document filtering and ordering.
//!
//! This module provides the evaluation engine behind [`Query::filter`](crate::query::Query::filter)
//! and [`Query::order_by`](crate::query::Query::order_by). Evaluation pattern-matches on
//! the [`Value`] type tag, so a mismatched type never silently changes a predicate's
//! meaning: comparing a string field against a number is simply `false`.
//!
//! Timestamp fields are the one strict case. They can only be compared against a
//! date, anything else fails with [`DocumentStoreError::TimestampComparisonRequiresDate`].

use std::cmp::Ordering;

use docmem_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FieldOp, MAX_LIST_OPERANDS, Predicate},
    value::{Map, Value, normalize_operand},
};
use indexmap::IndexMap;

/// A predicate whose operand has been normalized and validated.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPredicate {
    field: String,
    op: FieldOp,
    operand: Value,
}

impl CompiledPredicate {
    /// Normalizes the operand and checks list cardinality.
    pub fn compile(predicate: &Predicate) -> DocumentStoreResult<Self> {
        let operand = normalize_operand(&predicate.operand)?;

        if predicate.op.takes_list() {
            match &operand {
                Value::Array(values) if !values.is_empty() && values.len() <= MAX_LIST_OPERANDS => {}
                _ => {
                    return Err(DocumentStoreError::InvalidOperandCardinality(
                        predicate.op.as_str().to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            field: predicate.field.clone(),
            op: predicate.op,
            operand,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Resolves a field of a document.
///
/// An exact top-level key wins; otherwise a dotted name walks nested objects.
pub(crate) fn lookup<'a>(document: &'a Map, field: &str) -> Option<&'a Value> {
    if let Some(value) = document.get(field) {
        return Some(value);
    }

    let mut parts = field.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = current.as_object()?.get(part)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Map,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Map) -> Self {
        Self { document }
    }

    pub fn evaluate(&self, predicate: &CompiledPredicate) -> DocumentStoreResult<bool> {
        evaluate_op(
            &predicate.field,
            lookup(self.document, &predicate.field),
            predicate.op,
            &predicate.operand,
        )
    }

    /// Keeps the documents matching the predicate, preserving their order.
    pub fn filter_documents(
        documents: IndexMap<String, Map>,
        predicate: &CompiledPredicate,
    ) -> DocumentStoreResult<IndexMap<String, Map>> {
        let mut matched = IndexMap::with_capacity(documents.len());

        for (id, document) in documents {
            if DocumentEvaluator::new(&document).evaluate(predicate)? {
                matched.insert(id, document);
            }
        }

        Ok(matched)
    }
}

/// Evaluates one operator against an optional field value.
///
/// `field` is only used to name the field in errors.
pub(crate) fn evaluate_op(
    field: &str,
    field_value: Option<&Value>,
    op: FieldOp,
    operand: &Value,
) -> DocumentStoreResult<bool> {
    // A missing field matches nothing, whatever the operator.
    let Some(value) = field_value else {
        return Ok(false);
    };

    match op {
        FieldOp::Eq => equals(field, value, operand),
        FieldOp::Ne => Ok(!equals(field, value, operand)?),
        FieldOp::Lt => Ok(compare(field, value, operand)?.is_some_and(Ordering::is_lt)),
        FieldOp::Lte => Ok(compare(field, value, operand)?.is_some_and(Ordering::is_le)),
        FieldOp::Gt => Ok(compare(field, value, operand)?.is_some_and(Ordering::is_gt)),
        FieldOp::Gte => Ok(compare(field, value, operand)?.is_some_and(Ordering::is_ge)),
        FieldOp::ArrayContains => Ok(match value {
            Value::Array(items) => items.iter().any(|item| item == operand),
            _ => false,
        }),
        FieldOp::ArrayContainsAny => Ok(match value {
            Value::Array(items) => list(operand)
                .iter()
                .any(|candidate| items.contains(candidate)),
            _ => false,
        }),
        FieldOp::In => is_member(field, value, operand),
        FieldOp::NotIn => Ok(!is_member(field, value, operand)?),
    }
}

fn list(operand: &Value) -> &[Value] {
    operand.as_array().unwrap_or_default()
}

// Every candidate is checked so a Timestamp field fails on any non-date member,
// not only on those before the first match.
fn is_member(field: &str, value: &Value, operand: &Value) -> DocumentStoreResult<bool> {
    let mut found = false;

    for candidate in list(operand) {
        found |= equals(field, value, candidate)?;
    }

    Ok(found)
}

fn equals(field: &str, value: &Value, operand: &Value) -> DocumentStoreResult<bool> {
    match (value, operand) {
        (Value::Timestamp(left), Value::Timestamp(right)) => Ok(left == right),
        (Value::Timestamp(_), _) => Err(timestamp_error(field)),
        (left, right) => Ok(left == right),
    }
}

fn compare(field: &str, value: &Value, operand: &Value) -> DocumentStoreResult<Option<Ordering>> {
    Ok(match (value, operand) {
        (Value::Timestamp(left), Value::Timestamp(right)) => Some(left.cmp(right)),
        (Value::Timestamp(_), _) => return Err(timestamp_error(field)),
        (Value::Number(left), Value::Number(right)) => left.partial_cmp(right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    })
}

fn timestamp_error(field: &str) -> DocumentStoreError {
    DocumentStoreError::TimestampComparisonRequiresDate(field.to_string())
}

/// Total order used by `order_by`.
///
/// Missing fields sort first, then by type: null, bool, number, timestamp, string,
/// array, object. Within a type, values use their natural order; strings compare by
/// code point.
pub(crate) fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => value_order(left, right),
    }
}

fn value_order(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| value_order(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .zip(b.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| value_order(va, vb)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => left.kind().cmp(&right.kind()),
    }
}
