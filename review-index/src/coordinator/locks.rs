//! Per-entity lock registry.
//!
//! Each write request locks the document it targets and every landlord whose
//! derived fields it recomputes. Locks are keyed by entity, so writes against
//! unrelated landlords never wait on each other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use review_index_shared::{ApartmentId, LandlordId, ReviewId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::ReviewIndexError;

/// Key of a lockable entity.
///
/// The derived ordering (variant first, then id) is the global acquisition
/// order used by [`LockRegistry::acquire_all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Apartment(ApartmentId),
    Landlord(LandlordId),
    Review(ReviewId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Apartment(id) => write!(f, "apartment:{}", id),
            LockKey::Landlord(id) => write!(f, "landlord:{}", id),
            LockKey::Review(id) => write!(f, "review:{}", id),
        }
    }
}

/// An acquired lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

/// Registry of per-entity mutexes.
///
/// Tokio mutexes queue waiters in FIFO order, so writers against the same
/// landlord are applied in the order they asked for the lock.
#[derive(Debug)]
pub struct LockRegistry {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    wait_timeout: Duration,
}

impl LockRegistry {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            wait_timeout,
        }
    }

    /// Acquire the lock for `key`, waiting at most the configured timeout.
    pub async fn acquire(&self, key: LockKey) -> Result<LockGuard, ReviewIndexError> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match timeout(self.wait_timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "Lock acquired");
                Ok(LockGuard { key, _guard: guard })
            }
            Err(_) => {
                warn!(
                    key = %key,
                    waited_ms = self.wait_timeout.as_millis() as u64,
                    "Timed out waiting for lock"
                );
                Err(ReviewIndexError::ConcurrencyTimeoutError {
                    key: key.to_string(),
                    waited_ms: self.wait_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Acquire several locks in the global key order, skipping duplicates.
    ///
    /// If any acquisition times out, the locks already taken are released.
    pub async fn acquire_all(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
    ) -> Result<Vec<LockGuard>, ReviewIndexError> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key).await?);
        }
        Ok(guards)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop registry entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!(removed, remaining = self.locks.len(), "Pruned idle locks");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landlord(id: &str) -> LockKey {
        LockKey::Landlord(LandlordId::new(id))
    }

    #[tokio::test]
    async fn test_same_key_times_out_while_held() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let _held = registry.acquire(landlord("L1")).await.unwrap();

        let err = registry.acquire(landlord("L1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            ReviewIndexError::ConcurrencyTimeoutError { ref key, .. } if key == "landlord:L1"
        ));
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let _l1 = registry.acquire(landlord("L1")).await.unwrap();
        assert!(registry.acquire(landlord("L2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let guard = registry.acquire(landlord("L1")).await.unwrap();
        drop(guard);
        assert!(registry.acquire(landlord("L1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_all_sorts_and_dedups() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let guards = registry
            .acquire_all([landlord("L2"), landlord("L1"), landlord("L2")])
            .await
            .unwrap();

        let keys: Vec<String> = guards.iter().map(|g| g.key().to_string()).collect();
        assert_eq!(keys, vec!["landlord:L1", "landlord:L2"]);
    }

    #[tokio::test]
    async fn test_acquire_all_releases_on_timeout() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let held = registry.acquire(landlord("L2")).await.unwrap();

        assert!(registry
            .acquire_all([landlord("L1"), landlord("L2")])
            .await
            .is_err());
        drop(held);

        // L1 must not have been left locked by the failed batch.
        assert!(registry.acquire(landlord("L1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let registry = LockRegistry::new(Duration::from_millis(20));
        let _held = registry.acquire(landlord("L1")).await.unwrap();
        drop(registry.acquire(landlord("L2")).await.unwrap());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_key_order_groups_by_kind() {
        let mut keys = vec![
            LockKey::Review(ReviewId::new("R1")),
            landlord("L2"),
            LockKey::Apartment(ApartmentId::new("A1")),
            landlord("L1"),
        ];
        keys.sort();
        assert_eq!(
            keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["apartment:A1", "landlord:L1", "landlord:L2", "review:R1"]
        );
    }
}
