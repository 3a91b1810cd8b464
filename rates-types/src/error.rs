//! Error types for the currency rates service.

use rust_decimal::Decimal;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Malformed effective date: {0:?}")]
    InvalidEffectiveDate(String),

    #[error("Mid rate for {code} does not fit NUMERIC(18, 8): {mid}")]
    MidRateOutOfRange { code: String, mid: Decimal },
}

/// Rate source failures (transport, timeout, unusable response).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Rate source unreachable: {0}")]
    Transport(String),

    #[error("Rate source timed out")]
    Timeout,

    #[error("Rate source returned HTTP {0}")]
    Status(u16),

    #[error("Rate source returned no data")]
    Empty,

    #[error("Malformed rate source response: {0}")]
    Malformed(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Query cache backend failures. Never surfaced to query callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache codec error: {0}")]
    Codec(String),
}

/// Import run failures.
///
/// Everything except `Storage` is raised before the store is touched.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    DataSource(#[from] SourceError),

    #[error("Expected exactly one snapshot, rate source returned {count}")]
    AmbiguousSnapshot { count: usize },

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// Query failures.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("No rates have been imported yet")]
    NoData,

    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NoData => AppError::NotFound("No rates have been imported yet".into()),
            QueryError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
