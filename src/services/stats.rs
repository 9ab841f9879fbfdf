//! # Stats Aggregator
//!
//! Read-only rollup over the attempt ledger for display and admin views.
//! Reuses the decision engine's window math for `next_allowed_at` but
//! performs no writes, so it is safe to call at arbitrary frequency for UI
//! polling.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::ThrottleResult;
use crate::models::PolicyConfig;
use crate::services::throttle::ThrottleEngine;
use crate::storage::AttemptStore;

/// Per-identity attempt statistics.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityStats {
    pub total_attempts: i64,
    pub successful_attempts: i64,
    pub failed_attempts: i64,
    /// Attempts inside the trailing daily window.
    pub today_attempts: i64,
    pub last_attempt_at: Option<OffsetDateTime>,
    /// When the identity may next proceed, if currently blocked.
    pub next_allowed_at: Option<OffsetDateTime>,
}

pub struct StatsAggregator {
    ledger: Arc<dyn AttemptStore>,
    engine: ThrottleEngine,
}

impl StatsAggregator {
    pub fn new(ledger: Arc<dyn AttemptStore>, policy: PolicyConfig) -> Self {
        let engine = ThrottleEngine::new(Arc::clone(&ledger), policy);
        Self { ledger, engine }
    }

    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn stats(
        &self,
        identity: &str,
        now: OffsetDateTime,
    ) -> ThrottleResult<IdentityStats> {
        let totals = self.ledger.summary(identity).await?;
        let today_attempts = self
            .ledger
            .count_since(identity, now - self.engine.policy().daily_window())
            .await?;
        let decision = self.engine.evaluate(identity, now).await;

        Ok(IdentityStats {
            total_attempts: totals.total,
            successful_attempts: totals.successes,
            failed_attempts: totals.failures,
            today_attempts,
            last_attempt_at: totals.last_attempt_at,
            next_allowed_at: decision.next_allowed_at,
        })
    }
}
