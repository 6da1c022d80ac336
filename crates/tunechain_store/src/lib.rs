//! Embedded JSON document store for the TuneChain marketplace.
//! One durable JSON array per collection; this crate owns record identity,
//! timestamps, soft deletion, write serialization and querying.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod storage;
pub mod store;

pub use config::{LockPolicy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::collection::Collection;
pub use model::record::{Document, PayloadFields, Record, RecordId, RecordMeta};
pub use query::{paginate, sort_by, Page, PageInfo, PageRequest, QueryOptions, SortOrder};
pub use store::{DeleteMode, DocumentStore, Filter};

/// Returns the store crate version.
pub fn store_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::store_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!store_version().is_empty());
    }
}
