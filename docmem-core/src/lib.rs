//! Core types for an in-memory document store with chainable queries.
//!
//! This crate is the foundation of the docmem project and provides:
//!
//! - **Value model** ([`value`]) - Typed document values, timestamps and input normalization
//! - **Snapshots** ([`document`]) - Document and query snapshots with change records
//! - **Query vocabulary** ([`query`]) - Filter operators, sort directions and predicates
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmem_core::value::normalize_document;
//! use bson::doc;
//!
//! let fields = normalize_document(&doc! { "name": "Alice", "joined": chrono::Utc::now() })?;
//! assert!(fields["joined"].as_timestamp().is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmem_core;

pub mod document;
pub mod error;
pub mod query;
pub mod value;
