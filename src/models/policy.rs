//! # Throttle Policy Configuration
//!
//! Numeric thresholds that drive every throttling decision. A `PolicyConfig`
//! is resolved once per process at startup (environment overrides on top of
//! production defaults), validated, and treated as read-only thereafter.
//! Request handling never re-reads the environment.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;

use crate::utils::constant::CONSECUTIVE_LOOKBACK_FACTOR;

/// Errors that can occur while loading or validating a policy
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid value for `{name}`: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("policy constraint violated: {0}")]
    Constraint(&'static str),
}

/// Immutable set of throttling thresholds.
///
/// `Default` is the production profile; [`PolicyConfig::from_env`] layers
/// `THROTTLE_*` environment overrides on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Consecutive failed attempts before the circuit breaker trips.
    pub max_consecutive_failures: u32,
    /// Attempts of any outcome allowed inside the rolling daily window.
    pub max_daily_attempts: u32,
    /// Minimum spacing between two requests for the same identity.
    pub min_interval_seconds: i64,
    /// Cooldown imposed once the consecutive-failure breaker trips.
    pub consecutive_failure_wait_minutes: i64,
    /// Width of the rolling daily window (a lookback, not a calendar day).
    pub daily_window_hours: i64,
    /// Ledger rows older than this are eligible for purging.
    pub retention_days: i64,
    /// Warning-banner threshold, strictly below `max_consecutive_failures`.
    pub warn_consecutive_at: u32,
    /// Warning-banner threshold, strictly below `max_daily_attempts`.
    pub warn_daily_at: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 4,
            max_daily_attempts: 12,
            min_interval_seconds: 300,
            consecutive_failure_wait_minutes: 15,
            daily_window_hours: 24,
            retention_days: 30,
            warn_consecutive_at: 3,
            warn_daily_at: 10,
        }
    }
}

impl PolicyConfig {
    /// Resolves the policy from `THROTTLE_*` environment variables, falling
    /// back to the production defaults for anything unset.
    pub fn from_env() -> Result<Self, PolicyError> {
        let base = Self::default();
        let policy = Self {
            max_consecutive_failures: read_var(
                "THROTTLE_MAX_CONSECUTIVE_FAILURES",
                base.max_consecutive_failures,
            )?,
            max_daily_attempts: read_var("THROTTLE_MAX_DAILY_ATTEMPTS", base.max_daily_attempts)?,
            min_interval_seconds: read_var(
                "THROTTLE_MIN_INTERVAL_SECONDS",
                base.min_interval_seconds,
            )?,
            consecutive_failure_wait_minutes: read_var(
                "THROTTLE_CONSECUTIVE_FAILURE_WAIT_MINUTES",
                base.consecutive_failure_wait_minutes,
            )?,
            daily_window_hours: read_var("THROTTLE_DAILY_WINDOW_HOURS", base.daily_window_hours)?,
            retention_days: read_var("THROTTLE_RETENTION_DAYS", base.retention_days)?,
            warn_consecutive_at: read_var("THROTTLE_WARN_CONSECUTIVE_AT", base.warn_consecutive_at)?,
            warn_daily_at: read_var("THROTTLE_WARN_DAILY_AT", base.warn_daily_at)?,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Enforces the invariants every loaded policy must satisfy.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_consecutive_failures < 1 {
            return Err(PolicyError::Constraint(
                "max_consecutive_failures must be at least 1",
            ));
        }
        if self.max_daily_attempts < 1 {
            return Err(PolicyError::Constraint("max_daily_attempts must be at least 1"));
        }
        if self.min_interval_seconds < 0 {
            return Err(PolicyError::Constraint("min_interval_seconds must not be negative"));
        }
        if self.consecutive_failure_wait_minutes < 1 {
            return Err(PolicyError::Constraint(
                "consecutive_failure_wait_minutes must be at least 1",
            ));
        }
        if self.daily_window_hours < 1 {
            return Err(PolicyError::Constraint("daily_window_hours must be at least 1"));
        }
        if self.retention_days < 1 {
            return Err(PolicyError::Constraint("retention_days must be at least 1"));
        }
        if self.warn_consecutive_at >= self.max_consecutive_failures {
            return Err(PolicyError::Constraint(
                "warn_consecutive_at must be strictly below max_consecutive_failures",
            ));
        }
        if self.warn_daily_at >= self.max_daily_attempts {
            return Err(PolicyError::Constraint(
                "warn_daily_at must be strictly below max_daily_attempts",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn min_interval(&self) -> Duration {
        Duration::seconds(self.min_interval_seconds)
    }

    #[inline]
    pub fn consecutive_wait(&self) -> Duration {
        Duration::minutes(self.consecutive_failure_wait_minutes)
    }

    /// Bounded lookback used when scanning for a consecutive-failure run.
    #[inline]
    pub fn consecutive_lookback(&self) -> Duration {
        self.consecutive_wait() * CONSECUTIVE_LOOKBACK_FACTOR
    }

    #[inline]
    pub fn daily_window(&self) -> Duration {
        Duration::hours(self.daily_window_hours)
    }

    #[inline]
    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days)
    }
}

fn read_var<T: FromStr>(name: &'static str, default: T) -> Result<T, PolicyError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PolicyError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}
