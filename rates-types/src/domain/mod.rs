//! Domain models for the currency rates service.

pub mod rate;
pub mod snapshot;

pub use rate::{CurrencyRate, DEFAULT_TABLE, NewCurrencyRate, parse_effective_date};
pub use snapshot::{RateSnapshot, SnapshotRate};
