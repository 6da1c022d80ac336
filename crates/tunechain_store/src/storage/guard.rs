//! Per-collection write guard.
//!
//! # Responsibility
//! - Serialize read-modify-write cycles on the same collection.
//!
//! # Invariants
//! - At most one guarded writer per collection per store instance.
//! - Contention either waits or returns `StoreError::Busy`; a write is never
//!   skipped.
//! - Multi-collection acquisition always locks in `Collection::ALL` order.

use crate::config::LockPolicy;
use crate::error::{StoreError, StoreResult};
use crate::model::collection::{Collection, COLLECTION_COUNT};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std::time::Instant;

/// Lock table owned by one store instance.
#[derive(Debug)]
pub struct CollectionGuards {
    locks: [Mutex<()>; COLLECTION_COUNT],
    policy: LockPolicy,
}

impl CollectionGuards {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            locks: std::array::from_fn(|_| Mutex::new(())),
            policy,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Acquires the write guard for one collection.
    ///
    /// # Errors
    /// - Returns `Busy` when the policy is `TryFor` and the timeout elapses.
    pub fn acquire(&self, collection: Collection) -> StoreResult<MutexGuard<'_, ()>> {
        let lock = &self.locks[collection.index()];
        if let Some(guard) = lock.try_lock() {
            return Ok(guard);
        }

        let started_at = Instant::now();
        match self.policy {
            LockPolicy::Block => {
                let guard = lock.lock();
                debug!(
                    "event=guard_wait module=guard status=ok collection={} waited_ms={}",
                    collection,
                    started_at.elapsed().as_millis()
                );
                Ok(guard)
            }
            LockPolicy::TryFor(timeout) => match lock.try_lock_for(timeout) {
                Some(guard) => Ok(guard),
                None => {
                    warn!(
                        "event=guard_wait module=guard status=busy collection={} timeout_ms={}",
                        collection,
                        timeout.as_millis()
                    );
                    Err(StoreError::Busy { collection })
                }
            },
        }
    }

    /// Acquires every collection guard in declaration order.
    pub fn acquire_all(&self) -> StoreResult<Vec<MutexGuard<'_, ()>>> {
        Collection::ALL
            .into_iter()
            .map(|collection| self.acquire(collection))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionGuards;
    use crate::config::LockPolicy;
    use crate::error::StoreError;
    use crate::model::collection::Collection;
    use std::time::Duration;

    #[test]
    fn try_for_policy_reports_busy_while_held() {
        let guards = CollectionGuards::new(LockPolicy::TryFor(Duration::from_millis(10)));
        let held = guards.acquire(Collection::Tracks).unwrap();

        let err = guards.acquire(Collection::Tracks).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Busy {
                collection: Collection::Tracks
            }
        ));
        assert!(guards.acquire(Collection::Artists).is_ok());

        drop(held);
        assert!(guards.acquire(Collection::Tracks).is_ok());
    }

    #[test]
    fn acquire_all_holds_every_collection() {
        let guards = CollectionGuards::new(LockPolicy::TryFor(Duration::from_millis(1)));
        let held = guards.acquire_all().unwrap();
        assert_eq!(held.len(), Collection::ALL.len());
        assert!(guards.acquire(Collection::Analytics).is_err());
    }
}
