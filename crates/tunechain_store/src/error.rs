//! Store error taxonomy.
//!
//! # Responsibility
//! - Give every fallible store operation one semantic error type.
//! - Keep "not found" outcomes out of the error channel (`None`/`false`).
//!
//! # Invariants
//! - Lock contention surfaces as `Busy`; writes are never dropped silently.
//! - A corrupt durable artifact is reported, never overwritten.

use crate::model::collection::Collection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for document store persistence, decoding and maintenance operations.
#[derive(Debug)]
pub enum StoreError {
    /// File-system failure on a collection artifact or the data directory.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// JSON encoding/decoding failure outside of artifact parsing.
    Json(serde_json::Error),
    /// Durable artifact exists but is not a parseable JSON array.
    CorruptCollection {
        collection: Collection,
        message: String,
    },
    /// Concurrency guard could not be acquired within the configured timeout.
    Busy { collection: Collection },
    /// Persisted record cannot be converted into the requested payload type.
    InvalidData(String),
    /// Import input is not a JSON array.
    InvalidImport(String),
    /// External collection name is not one of the known collections.
    UnknownCollection(String),
    /// Configuration value cannot be parsed.
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "{err}"),
            Self::CorruptCollection {
                collection,
                message,
            } => write!(f, "collection `{collection}` is corrupt: {message}"),
            Self::Busy { collection } => {
                write!(f, "collection `{collection}` is busy; retry the write")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::InvalidImport(message) => write!(f, "invalid import payload: {message}"),
            Self::UnknownCollection(name) => write!(f, "unknown collection: `{name}`"),
            Self::InvalidConfig(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::CorruptCollection { .. } => None,
            Self::Busy { .. } => None,
            Self::InvalidData(_) => None,
            Self::InvalidImport(_) => None,
            Self::UnknownCollection(_) => None,
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
