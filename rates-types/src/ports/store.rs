//! Rate store port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Implemented by the Postgres and SQLite adapters.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{CurrencyRate, NewCurrencyRate};
use crate::error::RepoError;

/// Row counts of one replace, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub deleted: u64,
    pub inserted: u64,
}

/// Persistent set of currency rate rows.
///
/// Rows are unique on `(code, effective_date)`; the table discriminator is
/// not part of the constraint.
#[async_trait::async_trait]
pub trait RateStore: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Import (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Deletes every row for `(table, effective_date)` and inserts `rates`,
    /// in one transaction. Nothing is changed if any statement fails.
    async fn replace_snapshot(
        &self,
        table: &str,
        effective_date: NaiveDate,
        rates: Vec<NewCurrencyRate>,
    ) -> Result<ReplaceStats, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Read-only queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Maximum effective date across all rows, `None` when the store is empty.
    async fn latest_effective_date(&self) -> Result<Option<NaiveDate>, RepoError>;

    /// Rows for one date, ordered by code (ordinal).
    async fn rates_for_date(&self, date: NaiveDate) -> Result<Vec<CurrencyRate>, RepoError>;

    /// Distinct effective dates, most recent first.
    async fn publication_dates(&self) -> Result<Vec<NaiveDate>, RepoError>;

    /// Rows whose code matches exactly, oldest first.
    async fn history(&self, code: &str) -> Result<Vec<CurrencyRate>, RepoError>;
}

#[async_trait::async_trait]
impl<T: RateStore + ?Sized> RateStore for Arc<T> {
    async fn replace_snapshot(
        &self,
        table: &str,
        effective_date: NaiveDate,
        rates: Vec<NewCurrencyRate>,
    ) -> Result<ReplaceStats, RepoError> {
        (**self).replace_snapshot(table, effective_date, rates).await
    }

    async fn latest_effective_date(&self) -> Result<Option<NaiveDate>, RepoError> {
        (**self).latest_effective_date().await
    }

    async fn rates_for_date(&self, date: NaiveDate) -> Result<Vec<CurrencyRate>, RepoError> {
        (**self).rates_for_date(date).await
    }

    async fn publication_dates(&self) -> Result<Vec<NaiveDate>, RepoError> {
        (**self).publication_dates().await
    }

    async fn history(&self, code: &str) -> Result<Vec<CurrencyRate>, RepoError> {
        (**self).history(code).await
    }
}
