//! Periodic import loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use rates_types::{RateSource, RateStore};

use crate::ImportCoordinator;

/// Runs an import, then sleeps for `interval`, forever.
pub struct ImportWorker<S: RateSource, R: RateStore> {
    coordinator: Arc<ImportCoordinator<S, R>>,
    interval: Duration,
}

impl<S: RateSource, R: RateStore> ImportWorker<S, R> {
    pub fn new(coordinator: Arc<ImportCoordinator<S, R>>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    #[instrument(skip(self), fields(table = %self.coordinator.table()))]
    pub async fn run(self) {
        info!("Starting import worker, interval {:?}", self.interval);
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    /// One scheduled import. Surfaced failures are logged here and the loop goes on.
    pub async fn tick(&self) {
        if let Err(e) = self.coordinator.run().await {
            error!("Scheduled rate import failed: {}", e);
        }
    }
}
