//! Record envelope model.
//!
//! # Responsibility
//! - Keep store-managed metadata (`id`, timestamps, tombstone) apart from
//!   the opaque caller payload.
//! - Provide lifecycle helpers for update/soft-delete/restore stamping.
//!
//! # Invariants
//! - `created_at` never changes after construction.
//! - Every lifecycle transition moves `updated_at` strictly forward.
//! - `is_deleted` is the source of truth for tombstone state.
//!
//! On disk the envelope is flattened into one JSON object:
//! `{ id, createdAt, updatedAt, deletedAt?, isDeleted?, ...payload }`.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-less payload used at the durable boundary.
pub type Document = Map<String, Value>;

/// Store-assigned record identifier.
///
/// Kept as a `String` so imported artifacts with foreign id formats remain
/// addressable; ids generated by the store are UUID v4 strings.
pub type RecordId = String;

/// Keys owned by the store; stripped from caller payloads and patches.
pub const RESERVED_FIELDS: [&str; 5] = ["id", "createdAt", "updatedAt", "deletedAt", "isDeleted"];

/// Store-managed metadata attached to every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
}

impl RecordMeta {
    /// Fresh metadata with `created_at == updated_at == now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
            is_deleted: false,
        }
    }

    /// Bumps `updated_at` strictly forward.
    pub fn touch(&mut self) {
        self.updated_at = next_timestamp(self.updated_at);
    }

    /// Marks the record as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.touch();
        self.deleted_at = Some(self.updated_at);
        self.is_deleted = true;
    }

    /// Clears tombstone state.
    pub fn restore(&mut self) {
        self.touch();
        self.deleted_at = None;
        self.is_deleted = false;
    }
}

/// Canonical stored record: identity + metadata + opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<P = Document> {
    pub id: RecordId,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Record<P> {
    pub fn is_deleted(&self) -> bool {
        self.meta.is_deleted
    }

    /// Returns whether this record should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.meta.is_deleted
    }
}

/// Payloads whose top-level fields can be read in place.
pub trait PayloadFields {
    fn payload_field(&self, name: &str) -> Option<&Value>;
}

impl PayloadFields for Document {
    fn payload_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl PayloadFields for Value {
    fn payload_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<P: PayloadFields> Record<P> {
    /// Returns a named field as JSON, resolving metadata names first.
    ///
    /// Metadata fields use their durable names (`createdAt`, `isDeleted`, ...).
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "createdAt" => Some(Value::String(self.meta.created_at.to_rfc3339())),
            "updatedAt" => Some(Value::String(self.meta.updated_at.to_rfc3339())),
            "deletedAt" => self
                .meta
                .deleted_at
                .map(|at| Value::String(at.to_rfc3339())),
            "isDeleted" => Some(Value::Bool(self.meta.is_deleted)),
            _ => self.payload.payload_field(name).cloned(),
        }
    }
}

impl<P: Serialize> Record<P> {
    /// Converts the payload into a schema-less document.
    pub fn into_document(self) -> StoreResult<Record<Document>> {
        let payload = to_document(&self.payload)?;
        Ok(Record {
            id: self.id,
            meta: self.meta,
            payload,
        })
    }
}

impl Record<Document> {
    /// Decodes the schema-less payload into a caller type.
    ///
    /// # Errors
    /// - Returns `InvalidData` when the payload does not match `P`.
    pub fn decode<P: DeserializeOwned>(self) -> StoreResult<Record<P>> {
        let payload = serde_json::from_value(Value::Object(self.payload)).map_err(|err| {
            StoreError::InvalidData(format!("record `{}` payload mismatch: {err}", self.id))
        })?;
        Ok(Record {
            id: self.id,
            meta: self.meta,
            payload,
        })
    }

    /// Shallow-merges `patch` onto the payload, skipping reserved keys.
    ///
    /// Returns the number of keys written.
    pub fn merge(&mut self, patch: Document) -> usize {
        let mut written = 0;
        for (key, value) in patch {
            if is_reserved(&key) {
                continue;
            }
            self.payload.insert(key, value);
            written += 1;
        }
        written
    }
}

/// Serializes a caller payload into a document with reserved keys removed.
///
/// # Errors
/// - Returns `InvalidData` when the payload is not a JSON object.
pub fn to_document<P: Serialize + ?Sized>(payload: &P) -> StoreResult<Document> {
    match serde_json::to_value(payload)? {
        Value::Object(mut map) => {
            map.retain(|key, _| !is_reserved(key));
            Ok(map)
        }
        other => Err(StoreError::InvalidData(format!(
            "record payload must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Returns `now`, or `previous + 1µs` when the clock has not advanced.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Fills or coerces the envelope timestamps of a raw stored object.
///
/// A missing or null `createdAt` becomes `now`; a missing or null
/// `updatedAt` copies `createdAt`. Integer timestamps are read as Unix epoch
/// milliseconds. Other malformed values are left for decoding to reject.
///
/// Returns the number of fields rewritten.
pub(crate) fn repair_envelope(object: &mut Document, now: DateTime<Utc>) -> usize {
    let mut repaired = 0;
    for key in ["createdAt", "updatedAt", "deletedAt"] {
        let replacement = match object.get(key) {
            None | Some(Value::Null) => match key {
                "createdAt" => Some(Value::String(now.to_rfc3339())),
                "updatedAt" => object.get("createdAt").cloned(),
                _ => None,
            },
            Some(Value::Number(millis)) => millis
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|at| Value::String(at.to_rfc3339())),
            Some(_) => None,
        };
        if let Some(value) = replacement {
            object.insert(key.to_string(), value);
            repaired += 1;
        }
    }
    repaired
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
