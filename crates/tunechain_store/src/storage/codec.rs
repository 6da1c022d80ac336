//! Whole-collection JSON codec.
//!
//! # Responsibility
//! - Map a collection to its artifact and create it (`[]`) on first use.
//! - Read and write the full record array of one collection.
//!
//! # Invariants
//! - Entries without a non-empty string `id` are never persisted and are
//!   skipped on read.
//! - Entries with an id are never silently dropped: missing timestamps are
//!   stamped on read, and an envelope that cannot be repaired fails the
//!   strict read.
//! - Writes go to a uniquely named sibling temp file, are fsynced, then
//!   renamed over the artifact, so readers never observe a torn file.
//! - A zero-length artifact reads as an empty collection.

use crate::error::{StoreError, StoreResult};
use crate::model::collection::Collection;
use crate::model::record::{json_kind, repair_envelope, Record};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const EMPTY_COLLECTION: &[u8] = b"[]";

/// Reads and writes collection artifacts inside one data directory.
#[derive(Debug, Clone)]
pub struct CollectionCodec {
    data_dir: PathBuf,
    pretty: bool,
}

impl CollectionCodec {
    pub fn new(data_dir: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            pretty,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the artifact path for a collection without touching disk.
    pub fn path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    /// Returns the artifact path, creating an empty collection if absent.
    ///
    /// Creation publishes `[]` without replacing, so an existing artifact is
    /// never clobbered.
    pub fn resolve(&self, collection: Collection) -> StoreResult<PathBuf> {
        let path = self.path(collection);
        if path.exists() {
            return Ok(path);
        }

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|err| StoreError::io(&self.data_dir, err))?;
        let tmp = write_temp(&path, EMPTY_COLLECTION)?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(
                    "event=collection_init module=codec status=ok collection={}",
                    collection
                );
                Ok(path)
            }
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(path),
            Err(err) => Err(StoreError::io(&path, err.error)),
        }
    }

    /// Loads every record of a collection.
    ///
    /// # Errors
    /// - Returns `CorruptCollection` when the artifact is not a JSON array, or
    ///   when an entry with an id has an envelope that cannot be repaired.
    /// - Returns `Io` on file-system failures other than a missing file.
    pub fn read(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        self.load(collection, true)
    }

    /// Loads a collection, degrading a corrupt artifact to an empty one.
    ///
    /// Unrepairable entries are skipped instead of failing the read. Used by
    /// read-only paths; write paths call [`CollectionCodec::read`] so a
    /// corrupt artifact is reported instead of overwritten.
    pub fn read_lenient(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        match self.load(collection, false) {
            Ok(records) => Ok(records),
            Err(StoreError::CorruptCollection { message, .. }) => {
                error!(
                    "event=collection_read module=codec status=error collection={} error_code=corrupt_artifact error={}",
                    collection, message
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    fn load(&self, collection: Collection, strict: bool) -> StoreResult<Vec<Record>> {
        let path = self.resolve(collection)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: Value =
            serde_json::from_str(&raw).map_err(|err| StoreError::CorruptCollection {
                collection,
                message: err.to_string(),
            })?;
        let entries = match parsed {
            Value::Array(entries) => entries,
            other => {
                return Err(StoreError::CorruptCollection {
                    collection,
                    message: format!("top-level value is {}, expected array", json_kind(&other)),
                });
            }
        };

        let total = entries.len();
        let now = Utc::now();
        let mut records = Vec::with_capacity(total);
        let mut repaired = 0;
        for (position, entry) in entries.into_iter().enumerate() {
            match decode_entry(entry, now) {
                Ok((record, fixes)) => {
                    if fixes > 0 {
                        repaired += 1;
                    }
                    records.push(record);
                }
                Err(EntryError::Unaddressable(reason)) => {
                    warn!(
                        "event=record_skip module=codec status=warn collection={} position={} reason={}",
                        collection, position, reason
                    );
                }
                Err(EntryError::Malformed { id, reason }) if strict => {
                    return Err(StoreError::CorruptCollection {
                        collection,
                        message: format!("record `{id}` at position {position}: {reason}"),
                    });
                }
                Err(EntryError::Malformed { id, reason }) => {
                    warn!(
                        "event=record_skip module=codec status=warn collection={} position={} id={} reason={}",
                        collection, position, id, reason
                    );
                }
            }
        }

        if repaired > 0 {
            debug!(
                "event=collection_read module=codec status=repaired collection={} repaired={}",
                collection, repaired
            );
        }
        if records.len() != total {
            warn!(
                "event=collection_read module=codec status=partial collection={} kept={} skipped={}",
                collection,
                records.len(),
                total - records.len()
            );
        }
        Ok(records)
    }

    /// Replaces a collection artifact with `records`.
    ///
    /// Returns the number of records persisted.
    pub fn write(&self, collection: Collection, records: &[Record]) -> StoreResult<usize> {
        let path = self.resolve(collection)?;
        let valid: Vec<&Record> = records
            .iter()
            .filter(|record| !record.id.trim().is_empty())
            .collect();
        if valid.len() != records.len() {
            warn!(
                "event=collection_write module=codec status=warn collection={} dropped_without_id={}",
                collection,
                records.len() - valid.len()
            );
        }

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&valid)?
        } else {
            serde_json::to_vec(&valid)?
        };
        atomic_replace(&path, &bytes)?;
        Ok(valid.len())
    }

    /// Writes an empty array over a collection artifact.
    pub fn truncate(&self, collection: Collection) -> StoreResult<()> {
        let path = self.resolve(collection)?;
        atomic_replace(&path, EMPTY_COLLECTION)
    }
}

enum EntryError {
    /// No object or no usable id; the entry cannot be addressed and is dropped.
    Unaddressable(String),
    /// Addressable record whose envelope does not decode.
    Malformed { id: String, reason: String },
}

fn decode_entry(entry: Value, now: DateTime<Utc>) -> Result<(Record, usize), EntryError> {
    let mut object = match entry {
        Value::Object(object) => object,
        other => {
            return Err(EntryError::Unaddressable(format!(
                "entry is {}, expected object",
                json_kind(&other)
            )));
        }
    };
    let id = match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        _ => return Err(EntryError::Unaddressable("missing_or_empty_id".to_string())),
    };

    let fixes = repair_envelope(&mut object, now);
    serde_json::from_value(Value::Object(object))
        .map(|record| (record, fixes))
        .map_err(|err| EntryError::Malformed {
            id,
            reason: format!("invalid_envelope: {err}"),
        })
}

fn write_temp(path: &Path, bytes: &[u8]) -> StoreResult<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => format!(".{name}."),
        None => ".collection.".to_string(),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| StoreError::io(dir, err))?;
    if let Err(err) = tmp.write_all(bytes).and_then(|()| tmp.as_file().sync_all()) {
        return Err(StoreError::io(tmp.path(), err));
    }
    Ok(tmp)
}

fn atomic_replace(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    write_temp(path, bytes)?
        .persist(path)
        .map(|_| ())
        .map_err(|err| StoreError::io(path, err.error))
}
