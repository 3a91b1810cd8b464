//! Rate source port.
//!
//! Implementations can be HTTP clients, scripted fakes, etc.

use std::sync::Arc;

use crate::domain::RateSnapshot;
use crate::error::SourceError;

/// Port trait for rate snapshot providers.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync + 'static {
    /// Fetches the current snapshot(s) for a table.
    ///
    /// Must fail on transport errors, non-success statuses and empty
    /// responses instead of returning an empty list. A snapshot whose
    /// `rates` list is empty is a valid response.
    async fn fetch_snapshot(&self, table: &str) -> Result<Vec<RateSnapshot>, SourceError>;
}

#[async_trait::async_trait]
impl<T: RateSource + ?Sized> RateSource for Arc<T> {
    async fn fetch_snapshot(&self, table: &str) -> Result<Vec<RateSnapshot>, SourceError> {
        (**self).fetch_snapshot(table).await
    }
}
