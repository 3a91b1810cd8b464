//! # Rates Hex
//!
//! Application layer and HTTP adapter for the currency rates service.
//!
//! ## Architecture
//!
//! - `import/` - Import coordinator (snapshot replace, single-flight per date)
//! - `service/` - Query service (cache-aside reads)
//! - `cache/` - In-memory expiring `QueryCache`
//! - `lock/` - Keyed single-flight lock used by imports
//! - `worker/` - Periodic import loop
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! Both the coordinator and the service are generic over the port traits,
//! allowing different adapters to be injected.

pub mod cache;
pub mod import;
pub mod inbound;
pub mod lock;
pub mod service;
pub mod worker;

#[cfg(test)]
mod service_tests;

pub use cache::{MemoryCache, SWEEP_INTERVAL};
pub use import::ImportCoordinator;
pub use lock::KeyedLock;
pub use service::{DEFAULT_CACHE_TTL, RateQueryService};
pub use worker::ImportWorker;
