//! Durable storage primitives under the document store.
//!
//! # Responsibility
//! - Resolve collections to artifact files and (de)serialize whole collections.
//! - Serialize writers per collection.
//!
//! # Invariants
//! - Only `codec` touches artifact files.
//! - Artifacts are replaced atomically (temp file + rename).

pub mod codec;
pub mod guard;

pub use codec::CollectionCodec;
pub use guard::CollectionGuards;
