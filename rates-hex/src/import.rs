//! Import Coordinator
//!
//! Pulls one snapshot from the rate source and makes the store's rows for
//! that snapshot's `(table, date)` match it exactly.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use rates_types::{
    ImportError, NewCurrencyRate, RateSource, RateStore, parse_effective_date,
};

use crate::lock::KeyedLock;

/// Single-flight key of one replace unit.
pub type ImportKey = (String, NaiveDate);

/// Coordinates snapshot imports for one table.
///
/// Generic over `S: RateSource` and `R: RateStore` - adapters are injected.
pub struct ImportCoordinator<S: RateSource, R: RateStore> {
    source: S,
    store: R,
    table: String,
    lock: Arc<KeyedLock<ImportKey>>,
    surface_errors: bool,
}

impl<S: RateSource, R: RateStore> ImportCoordinator<S, R> {
    /// Creates a coordinator with its own lock and failures swallowed by `run`.
    pub fn new(source: S, store: R, table: impl Into<String>) -> Self {
        Self {
            source,
            store,
            table: table.into(),
            lock: Arc::new(KeyedLock::new()),
            surface_errors: false,
        }
    }

    /// Shares a single-flight lock with other coordinators in this process.
    pub fn with_lock(mut self, lock: Arc<KeyedLock<ImportKey>>) -> Self {
        self.lock = lock;
        self
    }

    /// Whether `run` returns import failures (`true`) or only logs them.
    pub fn with_surface_errors(mut self, surface_errors: bool) -> Self {
        self.surface_errors = surface_errors;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &R {
        &self.store
    }

    /// Scheduler entry point.
    ///
    /// With `surface_errors` off a failed run is logged and reported as
    /// success, so the caller cannot tell it from a no-op.
    pub async fn run(&self) -> Result<(), ImportError> {
        match self.import().await {
            Ok(()) => Ok(()),
            Err(e) if self.surface_errors => Err(e),
            Err(e) => {
                error!(table = %self.table, error = %e, "Rate import failed");
                Ok(())
            }
        }
    }

    /// Runs one import and always reports its outcome.
    ///
    /// Source, ambiguity and validation failures happen before the store is
    /// touched. The replace itself is a single store transaction.
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    pub async fn import(&self) -> Result<(), ImportError> {
        let mut snapshots = self.source.fetch_snapshot(&self.table).await?;

        if snapshots.len() != 1 {
            return Err(ImportError::AmbiguousSnapshot {
                count: snapshots.len(),
            });
        }
        let snapshot = snapshots.remove(0);

        if snapshot.table != self.table {
            warn!(
                received = %snapshot.table,
                "Snapshot table differs from the requested one, storing under the requested table"
            );
        }

        let effective_date = parse_effective_date(&snapshot.effective_date)?;

        let rows = snapshot
            .rates
            .iter()
            .map(|rate| NewCurrencyRate::from_snapshot(&self.table, effective_date, rate))
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.lock.lock((self.table.clone(), effective_date)).await;

        let stats = self
            .store
            .replace_snapshot(&self.table, effective_date, rows)
            .await?;

        info!(
            %effective_date,
            deleted = stats.deleted,
            inserted = stats.inserted,
            "Rate snapshot imported"
        );

        Ok(())
    }
}
