//! In-memory expiring `QueryCache`.
//!
//! Backed by `DashMap`, so concurrent readers only contend per shard.
//! Expired entries are dropped when read, and `set` sweeps the whole map
//! at most once per [`SWEEP_INTERVAL`] so keys that are never read again
//! do not pile up.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use rates_types::{CacheError, QueryCache};

/// Minimum time between two full sweeps triggered by `set`.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-local cache with per-entry time-to-live.
pub struct MemoryCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    next_sweep: Mutex<Instant>,
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry if the last sweep is older than [`SWEEP_INTERVAL`].
    fn sweep_expired(&self, now: Instant) {
        {
            let mut next = self
                .next_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if now < *next {
                return;
            }
            *next = now + SWEEP_INTERVAL;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Swept expired cache entries");
        }
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> QueryCache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let now = Instant::now();

        // The shard guard must be released before `remove_if` below.
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }

        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            debug!(key, "Evicted expired cache entry");
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        self.sweep_expired(now);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
