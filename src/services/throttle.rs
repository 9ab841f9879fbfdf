//! # Throttle Decision Engine
//!
//! Pure decision logic over attempt-ledger reads and a [`PolicyConfig`]:
//! answers "may this identity proceed now?". Two overlapping quotas apply,
//! checked in a fixed order:
//!
//! 1. **Consecutive-failure circuit breaker** - the run of failures counted
//!    back from the most recent attempt; a success anywhere resets the run.
//! 2. **Rolling daily quota** - attempts of any outcome inside the trailing
//!    daily window.
//!
//! An identity blocked by consecutive failures sees that reason even when it
//! is also over the daily cap.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, instrument};

use crate::error::StoreError;
use crate::models::{AttemptOutcome, Decision, DenyReason, PolicyConfig};
use crate::storage::AttemptStore;

#[derive(Clone)]
pub struct ThrottleEngine {
    ledger: Arc<dyn AttemptStore>,
    policy: PolicyConfig,
}

impl ThrottleEngine {
    /// The policy is expected to be validated already (see
    /// [`PolicyConfig::validate`]).
    pub fn new(ledger: Arc<dyn AttemptStore>, policy: PolicyConfig) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Evaluates both quotas for `identity` at instant `now`.
    ///
    /// Fails open: if the ledger cannot be read, the error is logged and the
    /// request is allowed with zeroed counters, so an infrastructure outage
    /// never locks users out of verification.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn evaluate(&self, identity: &str, now: OffsetDateTime) -> Decision {
        match self.check(identity, now).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, "Attempt ledger unreadable during throttle check, failing open");
                Decision::allow(0, 0)
            }
        }
    }

    async fn check(&self, identity: &str, now: OffsetDateTime) -> Result<Decision, StoreError> {
        let lookback = now - self.policy.consecutive_lookback();
        let recent = self
            .ledger
            .since(identity, lookback, self.policy.max_consecutive_failures)
            .await?;

        // Newest to oldest: count failures until the first success. Attempts
        // older than the most recent success are irrelevant to this counter.
        let mut consecutive_count = 0u32;
        for attempt in &recent {
            match attempt.outcome {
                AttemptOutcome::Failure => consecutive_count += 1,
                AttemptOutcome::Success => break,
            }
        }

        if consecutive_count >= self.policy.max_consecutive_failures
            && let Some(most_recent) = recent.first()
        {
            let next_allowed_at = most_recent.created_at + self.policy.consecutive_wait();
            if now < next_allowed_at {
                debug!(consecutive_count, "Consecutive-failure breaker is open");
                return Ok(Decision::deny(
                    DenyReason::ConsecutiveLimit,
                    next_allowed_at,
                    now,
                    consecutive_count,
                    0,
                ));
            }
        }

        let window_start = now - self.policy.daily_window();
        let daily_count = self.ledger.count_since(identity, window_start).await?;

        if daily_count >= i64::from(self.policy.max_daily_attempts) {
            // The window clears when its oldest qualifying attempt ages out.
            let oldest = self.ledger.oldest_since(identity, window_start).await?;
            let next_allowed_at = oldest.unwrap_or(now) + self.policy.daily_window();
            debug!(daily_count, "Rolling daily quota exhausted");
            return Ok(Decision::deny(
                DenyReason::DailyLimit,
                next_allowed_at,
                now,
                consecutive_count,
                daily_count,
            ));
        }

        Ok(Decision::allow(consecutive_count, daily_count))
    }
}
