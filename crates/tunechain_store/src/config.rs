//! Store configuration.
//!
//! # Responsibility
//! - Describe where collection artifacts live and how writers contend.
//! - Load overrides from process environment for binaries and scripts.
//!
//! # Invariants
//! - Each `DocumentStore` owns its config; there is no process-global base path.

use crate::error::{StoreError, StoreResult};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "TUNECHAIN_DATA_DIR";
pub const ENV_LOCK_TIMEOUT_MS: &str = "TUNECHAIN_LOCK_TIMEOUT_MS";
pub const ENV_PRETTY_JSON: &str = "TUNECHAIN_PRETTY_JSON";

const DEFAULT_DATA_DIR: &str = "data";

/// How a writer behaves when another writer holds the collection guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Wait until the guard is released.
    #[default]
    Block,
    /// Wait at most the given duration, then fail with `StoreError::Busy`.
    TryFor(Duration),
}

/// Document store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding one `<collection>.json` artifact per collection.
    pub data_dir: PathBuf,
    pub lock_policy: LockPolicy,
    /// Pretty-print artifacts (two-space indent) instead of compact JSON.
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_policy: LockPolicy::Block,
            pretty: true,
        }
    }

    pub fn with_lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = lock_policy;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Builds a config from `TUNECHAIN_*` environment variables.
    ///
    /// # Errors
    /// - Returns `InvalidConfig` when a variable is set but unparsable.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let data_dir = lookup(ENV_DATA_DIR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::new(data_dir);

        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|_| {
                StoreError::InvalidConfig(format!(
                    "{ENV_LOCK_TIMEOUT_MS} must be an integer, got `{raw}`"
                ))
            })?;
            config.lock_policy = LockPolicy::TryFor(Duration::from_millis(millis));
        }

        if let Some(raw) = lookup(ENV_PRETTY_JSON) {
            config.pretty = parse_bool(&raw).ok_or_else(|| {
                StoreError::InvalidConfig(format!(
                    "{ENV_PRETTY_JSON} must be true|false|1|0, got `{raw}`"
                ))
            })?;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
