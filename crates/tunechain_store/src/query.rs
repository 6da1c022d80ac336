//! Query helpers over materialized record snapshots.
//!
//! # Responsibility
//! - Field-based text matching used by store search.
//! - Sorting and pagination of already-loaded results.
//!
//! # Invariants
//! - `paginate` clamps `page >= 1` and `1 <= limit <= 100`.
//! - `sort_by` is stable; records with equal keys keep their input order.

use crate::error::StoreError;
use crate::model::record::{is_reserved, Document, PayloadFields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Options for store listing queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Opt-in visibility for soft-deleted records. A filter predicate alone
    /// never sees tombstoned records.
    pub include_deleted: bool,
}

/// Sort direction for [`sort_by`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(StoreError::InvalidConfig(format!(
                "unsupported sort order `{other}`; expected asc|desc"
            ))),
        }
    }
}

/// Requested page window; defaults to page 1 with 10 items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Pagination summary returned next to page data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Slices `items` into one page after clamping `page` and `limit`.
pub fn paginate<T: Clone>(items: &[T], page: i64, limit: i64) -> Page<T> {
    let page = page.max(1) as usize;
    let limit = limit.clamp(1, MAX_LIMIT) as usize;
    let total = items.len();
    let pages = total.div_ceil(limit);

    let start = (page - 1).saturating_mul(limit).min(total);
    let end = start.saturating_add(limit).min(total);

    Page {
        data: items[start..end].to_vec(),
        pagination: PageInfo {
            page,
            limit,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        },
    }
}

/// Paginates with a [`PageRequest`].
pub fn paginate_request<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    paginate(items, request.page, request.limit)
}

/// Sorts records by a named payload or metadata field.
///
/// Ordering across JSON kinds: missing/null < boolean < number < string <
/// array < object. `Desc` reverses the comparison, not the tie order.
pub fn sort_by<P: PayloadFields>(
    items: Vec<Record<P>>,
    field: &str,
    order: SortOrder,
) -> Vec<Record<P>> {
    let mut keyed: Vec<(Option<Value>, Record<P>)> = items
        .into_iter()
        .map(|record| (record.field(field), record))
        .collect();

    keyed.sort_by(|(left, _), (right, _)| {
        let ordering = compare_values(left.as_ref(), right.as_ref());
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Total order over optional JSON values used by [`sort_by`].
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let (left_rank, right_rank) = (kind_rank(left), kind_rank(right));
    if left_rank != right_rank {
        return left_rank.cmp(&right_rank);
    }

    match (left, right) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => {
                    let a = a.as_f64().unwrap_or(f64::NAN);
                    let b = b.as_f64().unwrap_or(f64::NAN);
                    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        _ => Ordering::Equal,
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Returns whether any named field contains `needle_lowercase`.
///
/// `needle_lowercase` must already be lowercased by the caller.
pub(crate) fn matches_text(record: &Record<Document>, needle_lowercase: &str, fields: &[&str]) -> bool {
    fields.iter().any(|field| {
        let text = if is_reserved(field) {
            record.field(field).as_ref().and_then(searchable_text)
        } else {
            record.payload.get(*field).and_then(searchable_text)
        };
        text.is_some_and(|text| text.to_lowercase().contains(needle_lowercase))
    })
}

fn searchable_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_values, matches_text, paginate, sort_by, SortOrder};
    use crate::model::record::{to_document, Record, RecordMeta};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::cmp::Ordering;

    fn record(id: &str, payload: Value) -> Record {
        Record {
            id: id.to_string(),
            meta: RecordMeta::new(Utc::now()),
            payload: to_document(&payload).unwrap(),
        }
    }

    #[test]
    fn paginate_clamps_page_and_limit() {
        let items: Vec<u32> = (0..250).collect();

        let page = paginate(&items, 1, 1000);
        assert_eq!(page.pagination.limit, 100);
        assert_eq!(page.data.len(), 100);
        assert_eq!(page.pagination.pages, 3);

        for requested in [0, -5] {
            let page = paginate(&items, requested, 10);
            assert_eq!(page.pagination.page, 1);
            assert_eq!(page.data[0], 0);
            assert!(!page.pagination.has_prev);
            assert!(page.pagination.has_next);
        }

        let page = paginate(&items, 2, 0);
        assert_eq!(page.pagination.limit, 1);
        assert_eq!(page.data, vec![1]);
    }

    #[test]
    fn paginate_reports_last_and_out_of_range_pages() {
        let items: Vec<u32> = (0..25).collect();

        let last = paginate(&items, 3, 10);
        assert_eq!(last.data, (20..25).collect::<Vec<_>>());
        assert_eq!(last.pagination.total, 25);
        assert_eq!(last.pagination.pages, 3);
        assert!(!last.pagination.has_next);
        assert!(last.pagination.has_prev);

        let beyond = paginate(&items, 9, 10);
        assert!(beyond.data.is_empty());
        assert!(!beyond.pagination.has_next);
        assert!(beyond.pagination.has_prev);

        let empty = paginate::<u32>(&[], 1, 10);
        assert_eq!(empty.pagination.pages, 0);
        assert!(!empty.pagination.has_next);
        assert!(!empty.pagination.has_prev);
    }

    #[test]
    fn sort_by_orders_numbers_and_strings_stably() {
        let records = vec![
            record("a", json!({ "plays": 10, "title": "beta" })),
            record("b", json!({ "plays": 2, "title": "alpha" })),
            record("c", json!({ "title": "gamma" })),
            record("d", json!({ "plays": 10, "title": "delta" })),
        ];

        let ascending = sort_by(records.clone(), "plays", SortOrder::Asc);
        let ids: Vec<&str> = ascending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "d"]);

        let descending = sort_by(records.clone(), "plays", SortOrder::Desc);
        let ids: Vec<&str> = descending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "b", "c"]);

        let by_title = sort_by(records, "title", SortOrder::Asc);
        let ids: Vec<&str> = by_title.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn compare_values_ranks_kinds() {
        assert_eq!(compare_values(None, Some(&json!(false))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(1.5)), Some(&json!(2))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(99)), Some(&json!("1"))), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None), Ordering::Equal);
    }

    #[test]
    fn matches_text_is_case_insensitive_across_kinds() {
        let track = record("t", json!({ "genre": "Electronic", "bpm": 128, "tags": ["lofi"] }));
        assert!(matches_text(&track, "electro", &["genre"]));
        assert!(matches_text(&track, "12", &["bpm"]));
        assert!(matches_text(&track, "lofi", &["tags"]));
        assert!(!matches_text(&track, "electro", &["title"]));
        assert!(matches_text(&track, "t", &["id"]));
    }
}
