//! RateQueryService unit tests, plus the in-memory ports shared with the
//! import tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use rates_types::{
        CacheError, CachedQuery, CurrencyRate, NewCurrencyRate, QueryCache, QueryError,
        RateSnapshot, RateSource, RateStore, RepoError, ReplaceStats, SourceError,
    };

    use crate::{MemoryCache, RateQueryService};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn new_rate(day: NaiveDate, code: &str, mid: Decimal) -> NewCurrencyRate {
        NewCurrencyRate {
            table: "B".into(),
            code: code.into(),
            currency_name: format!("{code} currency"),
            mid_rate: mid,
            effective_date: day,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory store
    // ─────────────────────────────────────────────────────────────────────────

    /// Simple in-memory store for testing the service and import layers.
    ///
    /// Enforces `(code, effective_date)` uniqueness like the real schema and
    /// applies a replace all-or-nothing.
    pub struct MockStore {
        rows: Mutex<Vec<CurrencyRate>>,
        next_id: AtomicI64,
        replace_delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        reads: AtomicUsize,
        fail_reads: AtomicBool,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                next_id: AtomicI64::new(1),
                replace_delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
                fail_reads: AtomicBool::new(false),
            }
        }

        /// Every replace sleeps this long before touching the rows.
        pub fn with_replace_delay(mut self, delay: Duration) -> Self {
            self.replace_delay = delay;
            self
        }

        pub fn seed(&self, table: &str, day: NaiveDate, rates: Vec<NewCurrencyRate>) {
            self.apply_replace(table, day, rates).unwrap();
        }

        pub fn rows(&self) -> Vec<CurrencyRate> {
            self.rows.lock().unwrap().clone()
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        fn read(&self) -> Result<(), RepoError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RepoError::Database("database is locked".into()));
            }
            Ok(())
        }

        fn apply_replace(
            &self,
            table: &str,
            day: NaiveDate,
            rates: Vec<NewCurrencyRate>,
        ) -> Result<ReplaceStats, RepoError> {
            let mut rows = self.rows.lock().unwrap();

            let mut next: Vec<CurrencyRate> = rows
                .iter()
                .filter(|r| !(r.table == table && r.effective_date == day))
                .cloned()
                .collect();
            let deleted = (rows.len() - next.len()) as u64;

            let mut inserted = 0;
            for rate in rates {
                if next
                    .iter()
                    .any(|r| r.code == rate.code && r.effective_date == day)
                {
                    return Err(RepoError::Conflict(format!(
                        "duplicate rate for {} on {}",
                        rate.code, day
                    )));
                }
                next.push(CurrencyRate {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    table: table.to_string(),
                    code: rate.code,
                    currency_name: rate.currency_name,
                    mid_rate: rate.mid_rate,
                    effective_date: day,
                });
                inserted += 1;
            }

            *rows = next;
            Ok(ReplaceStats { deleted, inserted })
        }
    }

    #[async_trait]
    impl RateStore for MockStore {
        async fn replace_snapshot(
            &self,
            table: &str,
            effective_date: NaiveDate,
            rates: Vec<NewCurrencyRate>,
        ) -> Result<ReplaceStats, RepoError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.replace_delay.is_zero() {
                tokio::time::sleep(self.replace_delay).await;
            }
            let result = self.apply_replace(table, effective_date, rates);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn latest_effective_date(&self) -> Result<Option<NaiveDate>, RepoError> {
            self.read()?;
            Ok(self.rows.lock().unwrap().iter().map(|r| r.effective_date).max())
        }

        async fn rates_for_date(&self, day: NaiveDate) -> Result<Vec<CurrencyRate>, RepoError> {
            self.read()?;
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.effective_date == day)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.code.cmp(&b.code));
            Ok(rows)
        }

        async fn publication_dates(&self) -> Result<Vec<NaiveDate>, RepoError> {
            self.read()?;
            let mut dates: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.effective_date)
                .collect();
            dates.sort_by(|a, b| b.cmp(a));
            dates.dedup();
            Ok(dates)
        }

        async fn history(&self, code: &str) -> Result<Vec<CurrencyRate>, RepoError> {
            self.read()?;
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.code == code)
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.effective_date);
            Ok(rows)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scripted source
    // ─────────────────────────────────────────────────────────────────────────

    enum Script {
        Snapshots(Vec<RateSnapshot>),
        Fail(fn() -> SourceError),
    }

    /// Rate source that answers every fetch from a script.
    pub struct MockSource {
        script: Mutex<Script>,
        calls: AtomicUsize,
        last_table: Mutex<Option<String>>,
    }

    impl MockSource {
        pub fn returning(snapshots: Vec<RateSnapshot>) -> Self {
            Self {
                script: Mutex::new(Script::Snapshots(snapshots)),
                calls: AtomicUsize::new(0),
                last_table: Mutex::new(None),
            }
        }

        pub fn failing(error: fn() -> SourceError) -> Self {
            Self {
                script: Mutex::new(Script::Fail(error)),
                calls: AtomicUsize::new(0),
                last_table: Mutex::new(None),
            }
        }

        pub fn set_snapshots(&self, snapshots: Vec<RateSnapshot>) {
            *self.script.lock().unwrap() = Script::Snapshots(snapshots);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_table(&self) -> Option<String> {
            self.last_table.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RateSource for MockSource {
        async fn fetch_snapshot(&self, table: &str) -> Result<Vec<RateSnapshot>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_table.lock().unwrap() = Some(table.to_string());
            match &*self.script.lock().unwrap() {
                Script::Snapshots(snapshots) => Ok(snapshots.clone()),
                Script::Fail(error) => Err(error()),
            }
        }
    }

    /// Cache whose backend is always down.
    pub struct BrokenCache;

    #[async_trait]
    impl QueryCache<CachedQuery> for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<CachedQuery>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: CachedQuery,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    fn service(store: Arc<MockStore>) -> RateQueryService<Arc<MockStore>> {
        RateQueryService::new(store, Arc::new(MemoryCache::<CachedQuery>::new()))
    }

    fn seeded_store() -> Arc<MockStore> {
        let store = MockStore::new();
        store.seed(
            "B",
            date(2024, 1, 9),
            vec![
                new_rate(date(2024, 1, 9), "USD", dec!(3.9900)),
                new_rate(date(2024, 1, 9), "EUR", dec!(4.3600)),
            ],
        );
        store.seed(
            "B",
            date(2024, 1, 10),
            vec![
                new_rate(date(2024, 1, 10), "usd", dec!(1.0)),
                new_rate(date(2024, 1, 10), "USD", dec!(4.0123)),
                new_rate(date(2024, 1, 10), "EUR", dec!(4.3712)),
                new_rate(date(2024, 1, 10), "AFN", dec!(0.0571)),
            ],
        );
        Arc::new(store)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_latest_rates_use_max_date_in_ordinal_code_order() {
        let svc = service(seeded_store());

        let rates = svc.latest_rates().await.unwrap();

        let codes: Vec<_> = rates.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["AFN", "EUR", "USD", "usd"]);
        assert!(rates.iter().all(|r| r.effective_date == date(2024, 1, 10)));
        assert_eq!(rates[2].mid_rate, dec!(4.0123));
    }

    #[tokio::test]
    async fn test_latest_rates_empty_store_is_no_data() {
        let svc = service(Arc::new(MockStore::new()));

        let result = svc.latest_rates().await;

        assert!(matches!(result, Err(QueryError::NoData)));
    }

    #[tokio::test]
    async fn test_no_data_is_not_cached() {
        let store = Arc::new(MockStore::new());
        let svc = service(store.clone());

        assert!(matches!(svc.latest_rates().await, Err(QueryError::NoData)));

        store.seed(
            "B",
            date(2024, 1, 10),
            vec![new_rate(date(2024, 1, 10), "USD", dec!(4.0))],
        );

        let rates = svc.latest_rates().await.unwrap();
        assert_eq!(rates.len(), 1);
    }

    #[tokio::test]
    async fn test_rates_by_date_without_date_on_empty_store_is_empty() {
        let svc = service(Arc::new(MockStore::new()));

        let rates = svc.rates_by_date(None).await.unwrap();

        assert!(rates.is_empty());
    }

    #[tokio::test]
    async fn test_rates_by_date_without_date_matches_latest() {
        let svc = service(seeded_store());

        let by_date = svc.rates_by_date(None).await.unwrap();
        let latest = svc.latest_rates().await.unwrap();

        assert_eq!(by_date, latest);
    }

    #[tokio::test]
    async fn test_rates_by_date_returns_only_that_date() {
        let svc = service(seeded_store());

        let rates = svc.rates_by_date(Some(date(2024, 1, 9))).await.unwrap();

        let codes: Vec<_> = rates.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["EUR", "USD"]);
    }

    #[tokio::test]
    async fn test_unknown_date_is_empty_and_cached() {
        let store = seeded_store();
        let svc = service(store.clone());

        let first = svc.rates_by_date(Some(date(2023, 12, 31))).await.unwrap();
        let reads = store.reads();
        let second = svc.rates_by_date(Some(date(2023, 12, 31))).await.unwrap();

        assert!(first.is_empty());
        assert!(second.is_empty());
        assert_eq!(store.reads(), reads);
    }

    #[tokio::test]
    async fn test_publication_dates_newest_first() {
        let svc = service(seeded_store());

        let dates = svc.publication_dates().await.unwrap();

        assert_eq!(dates, vec![date(2024, 1, 10), date(2024, 1, 9)]);
    }

    #[tokio::test]
    async fn test_history_is_case_sensitive_and_oldest_first() {
        let svc = service(seeded_store());

        let upper = svc.history("USD").await.unwrap();
        let lower = svc.history("usd").await.unwrap();
        let unknown = svc.history("Usd").await.unwrap();

        assert_eq!(upper.len(), 2);
        assert_eq!(upper[0].date, date(2024, 1, 9));
        assert_eq!(upper[0].rate, dec!(3.9900));
        assert_eq!(upper[1].date, date(2024, 1, 10));
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].rate, dec!(1.0));
        assert!(unknown.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Caching
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_repeated_query_is_served_from_cache() {
        let store = seeded_store();
        let svc = service(store.clone());

        svc.publication_dates().await.unwrap();
        svc.history("EUR").await.unwrap();
        svc.latest_rates().await.unwrap();
        let reads = store.reads();

        svc.publication_dates().await.unwrap();
        svc.history("EUR").await.unwrap();
        svc.latest_rates().await.unwrap();

        assert_eq!(store.reads(), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_stay_stale_until_ttl_expires() {
        let store = seeded_store();
        let svc = service(store.clone()).with_ttl(Duration::from_secs(3600));

        let before = svc.latest_rates().await.unwrap();
        assert_eq!(before[0].effective_date, date(2024, 1, 10));

        store.seed(
            "B",
            date(2024, 1, 11),
            vec![new_rate(date(2024, 1, 11), "USD", dec!(4.1))],
        );

        tokio::time::advance(Duration::from_secs(3599)).await;
        let stale = svc.latest_rates().await.unwrap();
        assert_eq!(stale, before);

        tokio::time::advance(Duration::from_secs(1)).await;
        let fresh = svc.latest_rates().await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].effective_date, date(2024, 1, 11));
    }

    #[tokio::test]
    async fn test_broken_cache_falls_back_to_store() {
        let store = seeded_store();
        let svc = RateQueryService::new(store.clone(), Arc::new(BrokenCache));

        let rates = svc.latest_rates().await.unwrap();
        let dates = svc.publication_dates().await.unwrap();
        let history = svc.history("EUR").await.unwrap();

        assert_eq!(rates.len(), 4);
        assert_eq!(dates.len(), 2);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_storage_error() {
        let store = seeded_store();
        store.fail_reads(true);
        let svc = service(store);

        let result = svc.publication_dates().await;

        assert!(matches!(result, Err(QueryError::Storage(_))));
    }
}
