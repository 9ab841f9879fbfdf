//! # Throttle Decisions
//!
//! The derived (never persisted) answer to "may this identity proceed now?".
//! Denials carry a human-actionable wait so callers can render a retry hint.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::PolicyConfig;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Too many failures in a row; the circuit breaker is open.
    ConsecutiveLimit,
    /// The rolling daily quota is exhausted.
    DailyLimit,
    /// A pending request was created too recently.
    MinInterval,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason_str = match self {
            DenyReason::ConsecutiveLimit => "consecutive_limit",
            DenyReason::DailyLimit => "daily_limit",
            DenyReason::MinInterval => "min_interval",
        };
        write!(f, "{reason_str}")
    }
}

/// Outcome of one throttle evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Whole minutes until retry, rounded up. Present on denials.
    pub wait_minutes: Option<i64>,
    /// Failed attempts counted back from the most recent attempt until the
    /// first success.
    pub consecutive_count: u32,
    /// Attempts of any outcome inside the rolling daily window. Only
    /// populated once the evaluation reaches the daily check.
    pub daily_count: i64,
    pub next_allowed_at: Option<OffsetDateTime>,
}

impl Decision {
    pub fn allow(consecutive_count: u32, daily_count: i64) -> Self {
        Self {
            allowed: true,
            reason: None,
            wait_minutes: None,
            consecutive_count,
            daily_count,
            next_allowed_at: None,
        }
    }

    pub fn deny(
        reason: DenyReason,
        next_allowed_at: OffsetDateTime,
        now: OffsetDateTime,
        consecutive_count: u32,
        daily_count: i64,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            wait_minutes: Some(wait_minutes_until(now, next_allowed_at)),
            consecutive_count,
            daily_count,
            next_allowed_at: Some(next_allowed_at),
        }
    }

    /// True when the identity is still allowed but has crossed a warning
    /// threshold, so the caller can surface a banner before the hard limit.
    pub fn nearing_limits(&self, policy: &PolicyConfig) -> bool {
        self.allowed
            && (self.consecutive_count >= policy.warn_consecutive_at
                || self.daily_count >= i64::from(policy.warn_daily_at))
    }
}

/// Whole minutes from `now` until `until`, rounded up, floored at zero.
pub(crate) fn wait_minutes_until(now: OffsetDateTime, until: OffsetDateTime) -> i64 {
    let seconds = (until - now).whole_seconds().max(0);
    (seconds + 59) / 60
}
