//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod cache;
mod source;
mod store;

pub use cache::{CacheKey, QueryCache};
pub use source::RateSource;
pub use store::{RateStore, ReplaceStats};
