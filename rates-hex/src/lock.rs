//! Keyed single-flight lock.
//!
//! One `tokio::sync::Mutex` per key, created on demand and dropped once the
//! last holder or waiter is gone.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Mutual exclusion per key; different keys never wait on each other.
pub struct KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

/// Held for as long as the caller needs exclusive access to `key`.
pub struct KeyedLockGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Waits until no one else holds `key`.
    pub async fn lock(&self, key: K) -> KeyedLockGuard<K> {
        // Cloned inside the shard lock, so the slot cannot be removed under us.
        let slot = self.slots.entry(key.clone()).or_default().clone();
        let guard = slot.lock_owned().await;

        KeyedLockGuard {
            key,
            slots: self.slots.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for KeyedLockGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // Unlock first; the guard itself keeps one reference to the mutex.
        drop(self.guard.take());
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
