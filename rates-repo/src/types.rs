//! Shared database types with feature-gated rows for SQLite and PostgreSQL.

use serde::{Serialize, de::DeserializeOwned};
use sqlx::FromRow;

use rates_types::{CacheError, RepoError};

#[cfg(feature = "sqlite")]
use chrono::NaiveDate;
#[cfg(feature = "sqlite")]
use rates_types::CurrencyRate;

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Currency rate row as SQLite stores it (decimal and date as text).
#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteCurrencyRate {
    pub id: i64,
    pub rate_table: String,
    pub code: String,
    pub currency_name: String,
    pub mid_rate: String,
    pub effective_date: String,
}

/// Currency rate row from PostgreSQL.
#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgCurrencyRate {
    pub id: i64,
    pub rate_table: String,
    pub code: String,
    pub currency_name: String,
    pub mid_rate: rust_decimal::Decimal,
    pub effective_date: chrono::NaiveDate,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[cfg(feature = "sqlite")]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(feature = "sqlite")]
pub fn parse_date(s: &str) -> Result<NaiveDate, RepoError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| RepoError::Database(format!("Invalid stored date {:?}: {}", s, e)))
}

/// Maps sqlx errors, keeping unique violations distinguishable.
pub fn db_error(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        _ => RepoError::Database(err.to_string()),
    }
}

pub fn tx_error(err: sqlx::Error) -> RepoError {
    RepoError::Transaction(err.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
impl SqliteCurrencyRate {
    /// Convert database row to domain CurrencyRate.
    pub fn into_domain(self) -> Result<CurrencyRate, RepoError> {
        let mid_rate = self
            .mid_rate
            .parse::<rust_decimal::Decimal>()
            .map_err(|e| RepoError::Database(format!("Invalid stored mid rate: {}", e)))?;

        Ok(CurrencyRate {
            id: self.id,
            table: self.rate_table,
            code: self.code,
            currency_name: self.currency_name,
            mid_rate,
            effective_date: parse_date(&self.effective_date)?,
        })
    }
}

#[cfg(feature = "postgres")]
impl PgCurrencyRate {
    /// Convert database row to domain CurrencyRate.
    pub fn into_domain(self) -> rates_types::CurrencyRate {
        rates_types::CurrencyRate {
            id: self.id,
            table: self.rate_table,
            code: self.code,
            currency_name: self.currency_name,
            mid_rate: self.mid_rate,
            effective_date: self.effective_date,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query cache payloads
// ─────────────────────────────────────────────────────────────────────────────

pub fn encode_payload<V: Serialize>(value: &V) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))
}

pub fn decode_payload<V: DeserializeOwned>(payload: &str) -> Result<V, CacheError> {
    serde_json::from_str(payload).map_err(|e| CacheError::Codec(e.to_string()))
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Absolute expiry for an entry written now.
pub fn expires_at_millis(ttl: std::time::Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl_ms)
}
