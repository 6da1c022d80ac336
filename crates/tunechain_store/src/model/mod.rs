//! Storage-level data model.
//!
//! # Responsibility
//! - Name the fixed set of collections the marketplace persists.
//! - Define the record envelope separating store metadata from payload.
//!
//! # Invariants
//! - Every record is identified by an `id` assigned once by the store.
//! - Soft deletion is a metadata flag, hard deletion removes the record.

pub mod collection;
pub mod record;
