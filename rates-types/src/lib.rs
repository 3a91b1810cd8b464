//! # Rates Types
//!
//! Domain types and port traits for the currency rates service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (CurrencyRate, RateSnapshot)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    CurrencyRate, DEFAULT_TABLE, NewCurrencyRate, RateSnapshot, SnapshotRate, parse_effective_date,
};
pub use dto::*;
pub use error::{AppError, CacheError, DomainError, ImportError, QueryError, RepoError, SourceError};
pub use ports::{CacheKey, QueryCache, RateSource, RateStore, ReplaceStats};
