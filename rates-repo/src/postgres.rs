//! PostgreSQL repository adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use rates_types::{
    CacheError, CurrencyRate, NewCurrencyRate, QueryCache, RateStore, RepoError, ReplaceStats,
};

use crate::types::{
    PgCurrencyRate, db_error, decode_payload, encode_payload, expires_at_millis, now_millis,
    tx_error,
};

const SELECT_RATE_COLUMNS: &str =
    "SELECT id, rate_table, code, currency_name, mid_rate, effective_date FROM currency_rates";

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository.
///
/// Replaces take an advisory transaction lock on `(table, date)`, so importer
/// processes sharing the database never interleave on the same snapshot.
/// Queries run in read-only transactions.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all schema migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_currency_rates_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_query_cache_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

fn import_lock_key(table: &str, effective_date: NaiveDate) -> String {
    format!("currency_rates:{}:{}", table, effective_date)
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn read_only(&self) -> Result<Transaction<'static, Postgres>, RepoError> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        Ok(tx)
    }

    async fn fetch_rates(
        &self,
        sql: &str,
        bind: RateFilter<'_>,
    ) -> Result<Vec<CurrencyRate>, RepoError> {
        let mut tx = self.read_only().await?;

        let query = sqlx::query_as::<_, PgCurrencyRate>(sql);
        let query = match bind {
            RateFilter::Date(date) => query.bind(date),
            RateFilter::Code(code) => query.bind(code),
        };
        let rows = query.fetch_all(&mut *tx).await.map_err(db_error)?;

        tx.commit().await.map_err(tx_error)?;

        Ok(rows.into_iter().map(PgCurrencyRate::into_domain).collect())
    }
}

enum RateFilter<'a> {
    Date(NaiveDate),
    Code(&'a str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate store implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RateStore for PostgresRepo {
    async fn replace_snapshot(
        &self,
        table: &str,
        effective_date: NaiveDate,
        rates: Vec<NewCurrencyRate>,
    ) -> Result<ReplaceStats, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_error)?;

        // Released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(import_lock_key(table, effective_date))
            .execute(&mut *db_tx)
            .await
            .map_err(db_error)?;

        let existing: Vec<i64> = sqlx::query_scalar(
            r#"SELECT id FROM currency_rates WHERE rate_table = $1 AND effective_date = $2 FOR UPDATE"#,
        )
        .bind(table)
        .bind(effective_date)
        .fetch_all(&mut *db_tx)
        .await
        .map_err(db_error)?;

        let mut stats = ReplaceStats::default();

        if !existing.is_empty() {
            stats.deleted = sqlx::query(r#"DELETE FROM currency_rates WHERE id = ANY($1)"#)
                .bind(existing.as_slice())
                .execute(&mut *db_tx)
                .await
                .map_err(db_error)?
                .rows_affected();
        }

        for rate in &rates {
            sqlx::query(
                r#"INSERT INTO currency_rates (rate_table, code, currency_name, mid_rate, effective_date)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(table)
            .bind(&rate.code)
            .bind(&rate.currency_name)
            .bind(rate.mid_rate)
            .bind(effective_date)
            .execute(&mut *db_tx)
            .await
            .map_err(db_error)?;

            stats.inserted += 1;
        }

        db_tx.commit().await.map_err(tx_error)?;

        Ok(stats)
    }

    async fn latest_effective_date(&self) -> Result<Option<NaiveDate>, RepoError> {
        let mut tx = self.read_only().await?;

        let latest: Option<NaiveDate> =
            sqlx::query_scalar(r#"SELECT MAX(effective_date) FROM currency_rates"#)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;

        tx.commit().await.map_err(tx_error)?;
        Ok(latest)
    }

    async fn rates_for_date(&self, date: NaiveDate) -> Result<Vec<CurrencyRate>, RepoError> {
        let sql =
            format!(r#"{SELECT_RATE_COLUMNS} WHERE effective_date = $1 ORDER BY code COLLATE "C""#);
        self.fetch_rates(&sql, RateFilter::Date(date)).await
    }

    async fn publication_dates(&self) -> Result<Vec<NaiveDate>, RepoError> {
        let mut tx = self.read_only().await?;

        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            r#"SELECT DISTINCT effective_date FROM currency_rates ORDER BY effective_date DESC"#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(tx_error)?;
        Ok(dates)
    }

    async fn history(&self, code: &str) -> Result<Vec<CurrencyRate>, RepoError> {
        let sql = format!("{SELECT_RATE_COLUMNS} WHERE code = $1 ORDER BY effective_date");
        self.fetch_rates(&sql, RateFilter::Code(code)).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared query cache
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl<V> QueryCache<V> for PostgresRepo
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let payload: Option<String> = sqlx::query_scalar(
            r#"SELECT payload FROM query_cache WHERE cache_key = $1 AND expires_at > $2"#,
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

        let purged = sqlx::query(r#"DELETE FROM query_cache WHERE expires_at <= $1"#)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired query cache rows");
        }

        sqlx::query(
            r#"INSERT INTO query_cache (cache_key, payload, expires_at) VALUES ($1, $2, $3)
               ON CONFLICT (cache_key) DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at"#,
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
