//! # Application Constants
//!
//! Fixed settings for the throttling engine. Anything operators are expected
//! to tune per environment lives in `PolicyConfig` instead.

use time::Duration;

/// Lifetime of a freshly minted verification request
///
/// A token not confirmed within this window transitions to `expired`.
pub const REQUEST_TTL: Duration = Duration::hours(24);

/// Lookback multiplier for the consecutive-failure scan
///
/// The decision engine fetches attempts no older than
/// `consecutive_failure_wait_minutes` times this factor; anything older
/// cannot keep the circuit breaker open anyway.
pub const CONSECUTIVE_LOOKBACK_FACTOR: i32 = 2;

/// Length of generated verification tokens
///
/// 48 alphanumeric characters drawn from a CSPRNG, collision-resistant at
/// the scale of the whole system's lifetime.
pub const TOKEN_LENGTH: usize = 48;

/// Interval between retention purges
///
/// The janitor task wakes at this interval to delete ledger rows past the
/// retention horizon.
pub const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Default attempt category recorded in the ledger
pub const DEFAULT_ATTEMPT_KIND: &str = "email_verification";

/// Maximum number of per-identity advisory locks kept in memory
///
/// When the lock map exceeds this size, idle entries are pruned to prevent
/// unlimited memory growth.
pub const IDENTITY_LOCK_CAPACITY: usize = 1024;
