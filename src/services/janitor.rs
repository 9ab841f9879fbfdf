//! # Retention Janitor
//!
//! Periodic purge of attempt-ledger rows older than the retention horizon.
//! Deletes are idempotent at the store, so overlapping scheduler ticks are
//! safe: a purge racing with itself neither double-counts nor errors.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{error, info, instrument};

use crate::error::StoreError;
use crate::models::PolicyConfig;
use crate::storage::AttemptStore;
use crate::utils::constant::PURGE_INTERVAL;

#[derive(Clone)]
pub struct RetentionJanitor {
    ledger: Arc<dyn AttemptStore>,
    policy: PolicyConfig,
}

impl RetentionJanitor {
    pub fn new(ledger: Arc<dyn AttemptStore>, policy: PolicyConfig) -> Self {
        Self { ledger, policy }
    }

    /// Purges everything older than `now - retention_days`, returning the
    /// number of rows removed.
    #[instrument(skip(self))]
    pub async fn run(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let cutoff = now - self.policy.retention();
        let purged = self.ledger.purge_older_than(cutoff).await?;
        if purged > 0 {
            info!(purged, "Purged attempts past the retention horizon");
        }
        Ok(purged)
    }

    /// Spawns the periodic purge task.
    pub fn spawn_purge_task(self) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            interval.tick().await; // first tick completes immediately

            loop {
                interval.tick().await;
                if let Err(e) = self.run(OffsetDateTime::now_utc()).await {
                    error!(error = %e, "Retention purge failed");
                }
            }
        });
    }
}
