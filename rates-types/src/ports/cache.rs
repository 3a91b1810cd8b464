//! Query cache port.
//!
//! Cache-aside storage for query results. Entries expire `ttl` after they
//! were set; nothing else evicts them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::CacheError;

/// Port trait for expiring key/value caches.
#[async_trait::async_trait]
pub trait QueryCache<V>: Send + Sync
where
    V: Send + 'static,
{
    /// Returns the value for `key` unless it is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError>;
}

#[async_trait::async_trait]
impl<V, T> QueryCache<V> for Arc<T>
where
    V: Send + 'static,
    T: QueryCache<V> + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }
}

/// Cache key of each query shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Latest,
    ByDate(NaiveDate),
    PublicationDates,
    /// Code is kept as given, matching the case-sensitive lookup.
    History(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Latest => write!(f, "latest"),
            CacheKey::ByDate(date) => write!(f, "byDate:{}", date.format("%Y-%m-%d")),
            CacheKey::PublicationDates => write!(f, "publicationDates"),
            CacheKey::History(code) => write!(f, "history:{}", code),
        }
    }
}
