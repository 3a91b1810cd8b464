//! Rate Query Service
//!
//! Read side of the rates store. Every query is answered cache-aside: a hit
//! is returned as is, a miss is computed from the store and cached for the
//! configured TTL. Nothing invalidates entries early, so results may lag an
//! import by up to one TTL.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use rates_types::{
    CacheKey, CachedQuery, CurrencyRateDto, QueryCache, QueryError, RateHistoryDto, RateStore,
};

/// Default lifetime of a cached query result (one hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Application service for rate queries.
///
/// Generic over `S: RateStore`. The cache is a trait object so the backend
/// (in-process or database-shared) is picked at startup.
pub struct RateQueryService<S: RateStore> {
    store: S,
    cache: Arc<dyn QueryCache<CachedQuery>>,
    ttl: Duration,
}

impl<S: RateStore> RateQueryService<S> {
    /// Creates a query service caching results for [`DEFAULT_CACHE_TTL`].
    pub fn new(store: S, cache: Arc<dyn QueryCache<CachedQuery>>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Rates of the most recent publication date, ordered by code.
    ///
    /// Fails with [`QueryError::NoData`] while the store is empty. An empty
    /// answer is never cached, so the first import shows up immediately.
    pub async fn latest_rates(&self) -> Result<Vec<CurrencyRateDto>, QueryError> {
        let key = CacheKey::Latest.to_string();

        if let Some(rates) = self.cache_get(&key).await.and_then(CachedQuery::into_rates) {
            return Ok(rates);
        }

        let Some(latest) = self.store.latest_effective_date().await? else {
            return Err(QueryError::NoData);
        };
        let rates = self.load_rates(latest).await?;
        if rates.is_empty() {
            return Err(QueryError::NoData);
        }

        self.cache_set(&key, CachedQuery::Rates(rates.clone())).await;
        Ok(rates)
    }

    /// Rates published on `date`, ordered by code.
    ///
    /// `None` behaves like [`latest_rates`](Self::latest_rates) except that
    /// an empty store yields an empty list instead of an error. A date with
    /// no rows yields an empty list, and that answer is cached.
    pub async fn rates_by_date(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<Vec<CurrencyRateDto>, QueryError> {
        let Some(date) = date else {
            return match self.latest_rates().await {
                Err(QueryError::NoData) => Ok(Vec::new()),
                other => other,
            };
        };

        self.get_or_compute(
            CacheKey::ByDate(date),
            CachedQuery::into_rates,
            CachedQuery::Rates,
            || self.load_rates(date),
        )
        .await
    }

    /// Distinct publication dates, newest first.
    pub async fn publication_dates(&self) -> Result<Vec<NaiveDate>, QueryError> {
        self.get_or_compute(
            CacheKey::PublicationDates,
            CachedQuery::into_dates,
            CachedQuery::Dates,
            || async { Ok::<_, QueryError>(self.store.publication_dates().await?) },
        )
        .await
    }

    /// Every stored rate of `code`, oldest first. The code is matched exactly.
    pub async fn history(&self, code: &str) -> Result<Vec<RateHistoryDto>, QueryError> {
        self.get_or_compute(
            CacheKey::History(code.to_string()),
            CachedQuery::into_history,
            CachedQuery::History,
            || async {
                let rows = self.store.history(code).await?;
                Ok::<_, QueryError>(rows.into_iter().map(RateHistoryDto::from).collect())
            },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache plumbing
    // ─────────────────────────────────────────────────────────────────────────────

    async fn load_rates(&self, date: NaiveDate) -> Result<Vec<CurrencyRateDto>, QueryError> {
        let rows = self.store.rates_for_date(date).await?;
        Ok(rows.into_iter().map(CurrencyRateDto::from).collect())
    }

    async fn get_or_compute<T, F, Fut>(
        &self,
        key: CacheKey,
        unwrap: fn(CachedQuery) -> Option<T>,
        wrap: fn(T) -> CachedQuery,
        compute: F,
    ) -> Result<T, QueryError>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        let key = key.to_string();

        if let Some(value) = self.cache_get(&key).await.and_then(unwrap) {
            return Ok(value);
        }

        let value = compute().await?;
        self.cache_set(&key, wrap(value.clone())).await;
        Ok(value)
    }

    /// A cache failure is logged and treated as a miss.
    async fn cache_get(&self, key: &str) -> Option<CachedQuery> {
        match self.cache.get(key).await {
            Ok(Some(value)) => {
                debug!(key, "Query cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key, "Query cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Query cache read failed, querying the store");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, value: CachedQuery) {
        if let Err(e) = self.cache.set(key, value, self.ttl).await {
            warn!(key, error = %e, "Query cache write failed");
        }
    }
}
