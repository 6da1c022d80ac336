//! Document store: record lifecycle, queries and maintenance.
//!
//! # Responsibility
//! - Provide CRUD, soft/hard delete, query/search and admin entry points
//!   addressed by [`Collection`].
//! - Route every artifact access through the codec and every mutation
//!   through the collection guard.
//!
//! # Invariants
//! - Read-modify-write cycles hold the collection guard from read to write.
//! - Mutations read strictly: a corrupt artifact fails the call instead of
//!   being replaced.
//! - Missing ids are `None`/`false` outcomes, not errors.
//! - `query`/`search` never return tombstoned records unless
//!   `QueryOptions::include_deleted` is set.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::collection::Collection;
use crate::model::record::{json_kind, repair_envelope, to_document, Record, RecordMeta};
use crate::query::{matches_text, QueryOptions};
use crate::storage::{CollectionCodec, CollectionGuards};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Deletion semantics for [`DocumentStore::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Tombstone in place (`isDeleted`, `deletedAt`).
    #[default]
    Soft,
    /// Remove the record from the artifact.
    Hard,
}

/// Borrowed filter predicate applied by [`DocumentStore::query`].
pub type Filter<'a, P> = &'a dyn Fn(&Record<P>) -> bool;

/// JSON-file document store over the fixed marketplace collections.
#[derive(Debug)]
pub struct DocumentStore {
    config: StoreConfig,
    codec: CollectionCodec,
    guards: CollectionGuards,
}

impl DocumentStore {
    /// Opens a store rooted at `config.data_dir`, creating the directory.
    ///
    /// Collection artifacts are created lazily on first reference.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|err| StoreError::io(&config.data_dir, err))?;
        info!(
            "event=store_open module=store status=ok data_dir={} lock_policy={:?}",
            config.data_dir.display(),
            config.lock_policy
        );

        Ok(Self {
            codec: CollectionCodec::new(config.data_dir.clone(), config.pretty),
            guards: CollectionGuards::new(config.lock_policy),
            config,
        })
    }

    /// Opens a store with default settings rooted at `data_dir`.
    pub fn open_dir(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(data_dir))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        self.codec.data_dir()
    }

    /// Returns the artifact path of a collection, initializing it if absent.
    pub fn resolve(&self, collection: Collection) -> StoreResult<PathBuf> {
        self.codec.resolve(collection)
    }

    /// Creates a record with a fresh id and `createdAt == updatedAt`.
    ///
    /// Store-owned keys present in `payload` are discarded.
    ///
    /// # Errors
    /// - `InvalidData` when `payload` is not a JSON object.
    /// - `Busy` when the guard cannot be acquired under `LockPolicy::TryFor`.
    pub fn create<P>(&self, collection: Collection, payload: &P) -> StoreResult<Record<P>>
    where
        P: Serialize + DeserializeOwned,
    {
        let document = to_document(payload)?;
        let id = Uuid::new_v4().to_string();

        let record = self.mutate(collection, |records| {
            if let Some(existing) = records.iter().find(|record| record.id == id) {
                warn!(
                    "event=record_create module=store status=duplicate collection={} id={}",
                    collection, id
                );
                return Ok((existing.clone(), false));
            }

            let record = Record {
                id: id.clone(),
                meta: RecordMeta::new(Utc::now()),
                payload: document,
            };
            records.push(record.clone());
            Ok((record, true))
        })?;

        info!(
            "event=record_create module=store status=ok collection={} id={}",
            collection, record.id
        );
        record.decode()
    }

    /// Gets the first record with `id`, tombstoned or not.
    pub fn get<P>(&self, collection: Collection, id: &str) -> StoreResult<Option<Record<P>>>
    where
        P: DeserializeOwned,
    {
        if id.trim().is_empty() {
            warn!(
                "event=record_get module=store status=invalid_id collection={}",
                collection
            );
            return Ok(None);
        }

        let found = self
            .codec
            .read_lenient(collection)?
            .into_iter()
            .find(|record| record.id == id);
        match found {
            Some(record) => record.decode().map(Some),
            None => {
                debug!(
                    "event=record_get module=store status=not_found collection={} id={}",
                    collection, id
                );
                Ok(None)
            }
        }
    }

    /// Returns the full snapshot including tombstoned records.
    pub fn get_all<P>(&self, collection: Collection) -> StoreResult<Vec<Record<P>>>
    where
        P: DeserializeOwned,
    {
        self.codec
            .read_lenient(collection)?
            .into_iter()
            .map(|record| record.decode())
            .collect()
    }

    /// Shallow-merges `patch` onto the record payload and bumps `updatedAt`.
    ///
    /// Returns `None` and leaves the collection untouched when `id` is absent.
    pub fn update<P, Q>(
        &self,
        collection: Collection,
        id: &str,
        patch: &Q,
    ) -> StoreResult<Option<Record<P>>>
    where
        P: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let patch = to_document(patch)?;
        let updated = self.mutate(collection, |records| {
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return Ok((None, false));
            };
            record.merge(patch);
            record.meta.touch();
            Ok((Some(record.clone()), true))
        })?;

        match updated {
            Some(record) => {
                info!(
                    "event=record_update module=store status=ok collection={} id={}",
                    collection, id
                );
                record.decode().map(Some)
            }
            None => {
                warn!(
                    "event=record_update module=store status=not_found collection={} id={}",
                    collection, id
                );
                Ok(None)
            }
        }
    }

    /// Deletes a record, tombstoning by default.
    ///
    /// Returns `false` when `id` is absent.
    pub fn delete(&self, collection: Collection, id: &str, mode: DeleteMode) -> StoreResult<bool> {
        let deleted = self.mutate(collection, |records| {
            let Some(position) = records.iter().position(|record| record.id == id) else {
                return Ok((false, false));
            };
            match mode {
                DeleteMode::Hard => {
                    records.remove(position);
                }
                DeleteMode::Soft => records[position].meta.soft_delete(),
            }
            Ok((true, true))
        })?;

        if deleted {
            info!(
                "event=record_delete module=store status=ok collection={} id={} mode={:?}",
                collection, id, mode
            );
        } else {
            warn!(
                "event=record_delete module=store status=not_found collection={} id={}",
                collection, id
            );
        }
        Ok(deleted)
    }

    /// Clears tombstone state of a soft-deleted record.
    ///
    /// Returns `None` when `id` is absent (including after a hard delete).
    pub fn restore<P>(&self, collection: Collection, id: &str) -> StoreResult<Option<Record<P>>>
    where
        P: DeserializeOwned,
    {
        let restored = self.mutate(collection, |records| {
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return Ok((None, false));
            };
            if !record.is_deleted() {
                return Ok((Some(record.clone()), false));
            }
            record.meta.restore();
            Ok((Some(record.clone()), true))
        })?;

        match restored {
            Some(record) => {
                info!(
                    "event=record_restore module=store status=ok collection={} id={}",
                    collection, id
                );
                record.decode().map(Some)
            }
            None => {
                warn!(
                    "event=record_restore module=store status=not_found collection={} id={}",
                    collection, id
                );
                Ok(None)
            }
        }
    }

    /// Lists active records, optionally narrowed by `filter`.
    ///
    /// Tombstoned records are excluded before `filter` runs.
    pub fn query<P>(
        &self,
        collection: Collection,
        filter: Option<Filter<'_, P>>,
    ) -> StoreResult<Vec<Record<P>>>
    where
        P: DeserializeOwned,
    {
        self.query_with(collection, QueryOptions::default(), filter)
    }

    /// Lists records with explicit visibility options.
    pub fn query_with<P>(
        &self,
        collection: Collection,
        options: QueryOptions,
        filter: Option<Filter<'_, P>>,
    ) -> StoreResult<Vec<Record<P>>>
    where
        P: DeserializeOwned,
    {
        let mut results = Vec::new();
        for record in self.codec.read_lenient(collection)? {
            if record.is_deleted() && !options.include_deleted {
                continue;
            }
            let record = record.decode::<P>()?;
            if filter.map_or(true, |filter| filter(&record)) {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Case-insensitive substring search over the named fields.
    ///
    /// Blank `text` or an empty `fields` list yields an empty result.
    pub fn search<P>(
        &self,
        collection: Collection,
        text: &str,
        fields: &[&str],
    ) -> StoreResult<Vec<Record<P>>>
    where
        P: DeserializeOwned,
    {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() || fields.is_empty() {
            warn!(
                "event=record_search module=store status=invalid_query collection={} fields={}",
                collection,
                fields.len()
            );
            return Ok(Vec::new());
        }

        self.codec
            .read_lenient(collection)?
            .into_iter()
            .filter(|record| record.is_active() && matches_text(record, &needle, fields))
            .map(|record| record.decode())
            .collect()
    }

    /// Replaces a collection with an empty array.
    pub fn clear(&self, collection: Collection) -> StoreResult<()> {
        let _guard = self.guards.acquire(collection)?;
        self.codec.truncate(collection)?;
        info!(
            "event=collection_clear module=store status=ok collection={}",
            collection
        );
        Ok(())
    }

    /// Replaces every collection with an empty array.
    pub fn clear_all(&self) -> StoreResult<()> {
        let _guards = self.guards.acquire_all()?;
        for collection in Collection::ALL {
            self.codec.truncate(collection)?;
        }
        info!("event=collection_clear module=store status=ok collection=all");
        Ok(())
    }

    /// Serializes the full snapshot (tombstones included) as a JSON array.
    pub fn export(&self, collection: Collection) -> StoreResult<String> {
        let records = self.codec.read(collection)?;
        let json = if self.config.pretty {
            serde_json::to_string_pretty(&records)?
        } else {
            serde_json::to_string(&records)?
        };
        info!(
            "event=collection_export module=store status=ok collection={} records={}",
            collection,
            records.len()
        );
        Ok(json)
    }

    /// Replaces a collection with the records of a JSON array.
    ///
    /// Entries without an id are dropped; entries without timestamps are
    /// stamped with the import time. Returns the number of records imported.
    ///
    /// # Errors
    /// - `InvalidImport` when `json` is not a JSON array; the collection is
    ///   left untouched.
    pub fn import(&self, collection: Collection, json: &str) -> StoreResult<usize> {
        let parsed: Value = serde_json::from_str(json).map_err(|err| {
            warn!(
                "event=collection_import module=store status=invalid collection={} error={}",
                collection, err
            );
            StoreError::InvalidImport(err.to_string())
        })?;
        let entries = match parsed {
            Value::Array(entries) => entries,
            other => {
                warn!(
                    "event=collection_import module=store status=invalid collection={} kind={}",
                    collection,
                    json_kind(&other)
                );
                return Err(StoreError::InvalidImport(format!(
                    "expected array, got {}",
                    json_kind(&other)
                )));
            }
        };

        let total = entries.len();
        let now = Utc::now();
        let records: Vec<Record> = entries
            .into_iter()
            .filter_map(|entry| match normalize_import_entry(entry, now) {
                Ok(record) => Some(record),
                Err(reason) => {
                    warn!(
                        "event=record_import module=store status=skip collection={} reason={}",
                        collection, reason
                    );
                    None
                }
            })
            .collect();

        let _guard = self.guards.acquire(collection)?;
        let written = self.codec.write(collection, &records)?;
        info!(
            "event=collection_import module=store status=ok collection={} imported={} skipped={}",
            collection,
            written,
            total - written
        );
        Ok(written)
    }

    /// Record count per known collection, tombstones included.
    pub fn stats(&self) -> StoreResult<BTreeMap<Collection, usize>> {
        Collection::ALL
            .into_iter()
            .map(|collection| {
                self.codec
                    .read_lenient(collection)
                    .map(|records| (collection, records.len()))
            })
            .collect()
    }

    /// Drops later records sharing an id with an earlier one.
    ///
    /// Returns the number of records removed; persists only when non-zero.
    pub fn remove_duplicates(&self, collection: Collection) -> StoreResult<usize> {
        let removed = self.mutate(collection, |records| {
            let before = records.len();
            let mut seen = HashSet::with_capacity(before);
            records.retain(|record| seen.insert(record.id.clone()));
            let removed = before - records.len();
            Ok((removed, removed > 0))
        })?;

        if removed > 0 {
            info!(
                "event=collection_dedupe module=store status=ok collection={} removed={}",
                collection, removed
            );
        }
        Ok(removed)
    }

    /// Runs a guarded read-modify-write cycle on one collection.
    ///
    /// `apply` returns its result plus whether the snapshot changed; the
    /// artifact is rewritten only when it did.
    fn mutate<T>(
        &self,
        collection: Collection,
        apply: impl FnOnce(&mut Vec<Record>) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        let _guard = self.guards.acquire(collection)?;
        let mut records = self.codec.read(collection)?;
        let (result, changed) = apply(&mut records)?;
        if changed {
            self.codec.write(collection, &records)?;
        }
        Ok(result)
    }
}

fn normalize_import_entry(entry: Value, now: DateTime<Utc>) -> Result<Record, String> {
    let mut object = match entry {
        Value::Object(object) => object,
        other => return Err(format!("entry is {}, expected object", json_kind(&other))),
    };
    match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        _ => return Err("missing_or_empty_id".to_string()),
    }

    repair_envelope(&mut object, now);
    serde_json::from_value(Value::Object(object)).map_err(|err| format!("invalid_envelope: {err}"))
}
