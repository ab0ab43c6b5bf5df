//! Filter operators, sort directions and typed predicate construction.
//!
//! Operators are addressed by name when building a query (`"=="`, `"in"`,
//! `"array-contains"`, ...) and parsed into a [`FieldOp`]. The [`Filter`] helper
//! builds [`Predicate`]s without going through operator names:
//!
//! ```ignore
//! use docmem::query::Filter;
//!
//! let predicate = Filter::gte("age", 18);
//! let members = Filter::in_("role", bson::bson!(["admin", "editor"]));
//! ```
//!
//! The evaluation rules for each operator live with the in-memory predicate engine.

use std::{fmt, str::FromStr};

use bson::Bson;

use crate::error::DocumentStoreError;

/// Maximum number of operand values accepted by the list operators
/// (`in`, `not-in`, `array-contains-any`).
pub const MAX_LIST_OPERANDS: usize = 10;

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `array-contains`
    ArrayContains,
    /// `array-contains-any`
    ArrayContainsAny,
    /// `in`
    In,
    /// `not-in`
    NotIn,
}

impl FieldOp {
    /// Returns the operator name as used in queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOp::Eq => "==",
            FieldOp::Ne => "!=",
            FieldOp::Lt => "<",
            FieldOp::Lte => "<=",
            FieldOp::Gt => ">",
            FieldOp::Gte => ">=",
            FieldOp::ArrayContains => "array-contains",
            FieldOp::ArrayContainsAny => "array-contains-any",
            FieldOp::In => "in",
            FieldOp::NotIn => "not-in",
        }
    }

    /// Whether the operand must be a list of 1 to [`MAX_LIST_OPERANDS`] values.
    pub fn takes_list(&self) -> bool {
        matches!(self, FieldOp::In | FieldOp::NotIn | FieldOp::ArrayContainsAny)
    }
}

impl FromStr for FieldOp {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FieldOp::Eq,
            "!=" => FieldOp::Ne,
            "<" => FieldOp::Lt,
            "<=" => FieldOp::Lte,
            ">" => FieldOp::Gt,
            ">=" => FieldOp::Gte,
            "array-contains" => FieldOp::ArrayContains,
            "array-contains-any" => FieldOp::ArrayContainsAny,
            "in" => FieldOp::In,
            "not-in" => FieldOp::NotIn,
            other => return Err(DocumentStoreError::UnsupportedOperator(other.to_string())),
        })
    }
}

impl fmt::Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl FromStr for SortDirection {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DocumentStoreError::InvalidArgument(format!(
                "sort direction must be \"asc\" or \"desc\", got {other:?}"
            ))),
        }
    }
}

/// A single `(field, operator, operand)` filter.
///
/// The operand is kept raw; it is normalized when the predicate is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The top-level field name to compare.
    pub field: String,
    /// The comparison operator.
    pub op: FieldOp,
    /// The value to compare against.
    pub operand: Bson,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FieldOp, operand: impl Into<Bson>) -> Self {
        Self { field: field.into(), op, operand: operand.into() }
    }

    /// Builds a predicate from an operator name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedOperator`] for unknown operator names.
    pub fn parse(field: impl Into<String>, op: &str, operand: impl Into<Bson>) -> Result<Self, DocumentStoreError> {
        Ok(Self::new(field, op.parse()?, operand))
    }
}

/// Helper struct for constructing predicates.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Eq, value)
    }

    /// Matches documents where the field exists and does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::Gte, value)
    }

    /// Matches documents whose array field contains the value.
    pub fn array_contains(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::ArrayContains, value)
    }

    /// Matches documents whose array field contains any of the values.
    pub fn array_contains_any(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::ArrayContainsAny, values)
    }

    /// Matches documents whose field equals one of the values.
    pub fn in_(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::In, values)
    }

    /// Matches documents whose field exists and equals none of the values.
    pub fn not_in(field: impl Into<String>, values: impl Into<Bson>) -> Predicate {
        Predicate::new(field, FieldOp::NotIn, values)
    }
}
