//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use tracing::debug;

use rates_types::{
    CacheError, CurrencyRate, NewCurrencyRate, QueryCache, RateStore, RepoError, ReplaceStats,
};

use crate::types::{
    SqliteCurrencyRate, db_error, decode_payload, encode_payload, expires_at_millis, format_date,
    now_millis, parse_date, tx_error,
};

const CREATE_CURRENCY_RATES: &str = include_str!("../migrations/0001_create_currency_rates.sql");
const CREATE_QUERY_CACHE: &str = include_str!("../migrations/0002_create_query_cache.sql");

const SELECT_RATE_COLUMNS: &str =
    "SELECT id, rate_table, code, currency_name, mid_rate, effective_date FROM currency_rates";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
///
/// File databases run in WAL mode, and queries go through a separate
/// read-only pool so they see the last committed snapshot while an import
/// holds the write lock. In-memory databases share one pool for both.
pub struct SqliteRepo {
    pool: SqlitePool,
    readers: SqlitePool,
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic schema bootstrap.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let in_memory = is_in_memory(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }
        let pool = SqlitePool::connect_with(options).await?;

        let mut repo = Self {
            readers: pool.clone(),
            pool,
        };
        repo.create_schema().await?;

        // Opened after the schema exists; read-only connections cannot create it.
        if !in_memory {
            let read_options = SqliteConnectOptions::from_str(database_url)?.read_only(true);
            repo.readers = SqlitePool::connect_with(read_options).await?;
        }

        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Pool used by rate queries. Read-only for file databases.
    pub fn read_pool(&self) -> &SqlitePool {
        &self.readers
    }

    /// Creates the database schema. Safe to run repeatedly.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        sqlx::query(CREATE_CURRENCY_RATES)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        sqlx::query(CREATE_QUERY_CACHE)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate store implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RateStore for SqliteRepo {
    async fn replace_snapshot(
        &self,
        table: &str,
        effective_date: NaiveDate,
        rates: Vec<NewCurrencyRate>,
    ) -> Result<ReplaceStats, RepoError> {
        let date_str = format_date(effective_date);

        let mut db_tx = self.pool.begin().await.map_err(tx_error)?;

        let existing: Vec<i64> = sqlx::query_scalar(
            r#"SELECT id FROM currency_rates WHERE rate_table = ? AND effective_date = ?"#,
        )
        .bind(table)
        .bind(&date_str)
        .fetch_all(&mut *db_tx)
        .await
        .map_err(db_error)?;

        let mut stats = ReplaceStats::default();

        if !existing.is_empty() {
            stats.deleted = sqlx::query(
                r#"DELETE FROM currency_rates WHERE rate_table = ? AND effective_date = ?"#,
            )
            .bind(table)
            .bind(&date_str)
            .execute(&mut *db_tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        }

        for rate in &rates {
            sqlx::query(
                r#"INSERT INTO currency_rates (rate_table, code, currency_name, mid_rate, effective_date)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(table)
            .bind(&rate.code)
            .bind(&rate.currency_name)
            .bind(rate.mid_rate.to_string())
            .bind(&date_str)
            .execute(&mut *db_tx)
            .await
            .map_err(db_error)?;

            stats.inserted += 1;
        }

        db_tx.commit().await.map_err(tx_error)?;

        Ok(stats)
    }

    async fn latest_effective_date(&self) -> Result<Option<NaiveDate>, RepoError> {
        let latest: Option<String> =
            sqlx::query_scalar(r#"SELECT MAX(effective_date) FROM currency_rates"#)
                .fetch_one(&self.readers)
                .await
                .map_err(db_error)?;

        latest.as_deref().map(parse_date).transpose()
    }

    async fn rates_for_date(&self, date: NaiveDate) -> Result<Vec<CurrencyRate>, RepoError> {
        let rows: Vec<SqliteCurrencyRate> = sqlx::query_as(&format!(
            "{SELECT_RATE_COLUMNS} WHERE effective_date = ? ORDER BY code"
        ))
        .bind(format_date(date))
        .fetch_all(&self.readers)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(SqliteCurrencyRate::into_domain).collect()
    }

    async fn publication_dates(&self) -> Result<Vec<NaiveDate>, RepoError> {
        let dates: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT effective_date FROM currency_rates ORDER BY effective_date DESC"#,
        )
        .fetch_all(&self.readers)
        .await
        .map_err(db_error)?;

        dates.iter().map(|d| parse_date(d)).collect()
    }

    async fn history(&self, code: &str) -> Result<Vec<CurrencyRate>, RepoError> {
        let rows: Vec<SqliteCurrencyRate> = sqlx::query_as(&format!(
            "{SELECT_RATE_COLUMNS} WHERE code = ? ORDER BY effective_date"
        ))
        .bind(code)
        .fetch_all(&self.readers)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(SqliteCurrencyRate::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared query cache
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl<V> QueryCache<V> for SqliteRepo
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let payload: Option<String> = sqlx::query_scalar(
            r#"SELECT payload FROM query_cache WHERE cache_key = ? AND expires_at > ?"#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        payload.as_deref().map(decode_payload::<V>).transpose()
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_payload(&value)?;

        let purged = sqlx::query(r#"DELETE FROM query_cache WHERE expires_at <= ?"#)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired query cache rows");
        }

        sqlx::query(
            r#"INSERT INTO query_cache (cache_key, payload, expires_at) VALUES (?, ?, ?)
               ON CONFLICT (cache_key) DO UPDATE SET payload = excluded.payload, expires_at = excluded.expires_at"#,
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at_millis(ttl))
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(())
    }
}
