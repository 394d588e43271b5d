//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of async mutexes, one per key, created on first use.
///
/// Guards are owned so they can be held across store I/O.
pub struct LockTable<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Guards held for a two-key operation.
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: Option<OwnedMutexGuard<()>>,
}

impl<K> LockTable<K>
where
    K: Copy + Ord + Hash,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, key: K) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        slots.entry(key).or_default().clone()
    }

    /// Wait until `key` is free and hold it.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.slot(key).await.lock_owned().await
    }

    /// Hold two keys, always acquiring the smaller one first.
    ///
    /// Locking the same key twice holds it once.
    pub async fn lock_pair(&self, a: K, b: K) -> PairGuard {
        if a == b {
            return PairGuard {
                _first: self.lock(a).await,
                _second: None,
            };
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(low).await;
        let second = self.lock(high).await;
        PairGuard {
            _first: first,
            _second: Some(second),
        }
    }

    /// Number of keys that have been locked at least once.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K> Default for LockTable<K>
where
    K: Copy + Ord + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
