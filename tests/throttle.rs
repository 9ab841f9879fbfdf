mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{seed_attempts, test_policy};
use time::{Duration, OffsetDateTime};
use verigate::error::StoreError;
use verigate::models::AttemptOutcome::{Failure, Success};
use verigate::models::{AttemptRecord, AttemptTotals, DenyReason};
use verigate::services::throttle::ThrottleEngine;
use verigate::storage::{AttemptStore, InMemoryAttemptStore};

fn engine_over(ledger: &Arc<InMemoryAttemptStore>) -> ThrottleEngine {
    ThrottleEngine::new(Arc::clone(ledger) as Arc<dyn AttemptStore>, test_policy())
}

#[test_log::test(tokio::test)]
async fn clean_history_is_allowed() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);

    let decision = engine.evaluate("fresh@example.com", OffsetDateTime::now_utc()).await;

    assert!(decision.allowed);
    assert_eq!(decision.consecutive_count, 0);
    assert_eq!(decision.daily_count, 0);
    assert!(decision.next_allowed_at.is_none());
}

#[test_log::test(tokio::test)]
async fn success_inside_failure_run_resets_the_counter() {
    // 3 failures, then 1 success, then 1 failure: the run restarts after the
    // success, so the count is 1 and the request goes through.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        "user@example.com",
        &[
            (Failure, Duration::minutes(5)),
            (Failure, Duration::minutes(4)),
            (Failure, Duration::minutes(3)),
            (Success, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;

    let decision = engine.evaluate("user@example.com", now).await;

    assert!(decision.allowed);
    assert_eq!(decision.consecutive_count, 1);
    assert_eq!(decision.daily_count, 5);
}

#[test_log::test(tokio::test)]
async fn breaker_trips_at_the_consecutive_limit() {
    // 4 consecutive failures with limit 4: denied until the cooldown ends.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        "user@example.com",
        &[
            (Failure, Duration::minutes(4)),
            (Failure, Duration::minutes(3)),
            (Failure, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;

    let decision = engine.evaluate("user@example.com", now).await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::ConsecutiveLimit));
    assert_eq!(decision.consecutive_count, 4);
    // Most recent failure was 1 minute ago, cooldown is 15 minutes.
    assert_eq!(decision.wait_minutes, Some(14));
    assert_eq!(decision.next_allowed_at, Some(now + Duration::minutes(14)));
}

#[test_log::test(tokio::test)]
async fn breaker_releases_once_the_cooldown_elapses() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        "user@example.com",
        &[
            (Failure, Duration::minutes(4)),
            (Failure, Duration::minutes(3)),
            (Failure, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;

    let decision = engine
        .evaluate("user@example.com", now + Duration::minutes(14))
        .await;

    assert!(decision.allowed);
}

#[test_log::test(tokio::test)]
async fn latest_success_clears_the_breaker() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        "user@example.com",
        &[
            (Failure, Duration::minutes(5)),
            (Failure, Duration::minutes(4)),
            (Failure, Duration::minutes(3)),
            (Success, Duration::minutes(1)),
        ],
        now,
    )
    .await;

    let decision = engine.evaluate("user@example.com", now).await;

    assert!(decision.allowed);
    assert_eq!(decision.consecutive_count, 0);
}

#[test_log::test(tokio::test)]
async fn consecutive_reason_wins_over_daily() {
    // Over both limits at once: the breaker reason is reported, never the
    // daily quota.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    let run: Vec<_> = (1..=12)
        .map(|i| (Failure, Duration::minutes(i)))
        .collect();
    seed_attempts(&ledger, "user@example.com", &run, now).await;

    let decision = engine.evaluate("user@example.com", now).await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::ConsecutiveLimit));
}

#[test_log::test(tokio::test)]
async fn daily_quota_denies_the_thirteenth_attempt() {
    // 12 attempts of mixed outcome within 24h against a limit of 12. The
    // newest is a success so the breaker stays closed and the daily quota is
    // the one that fires.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    let mixed: Vec<_> = (1..=12)
        .map(|i| {
            let outcome = if i % 2 == 1 { Success } else { Failure };
            (outcome, Duration::hours(i))
        })
        .collect();
    seed_attempts(&ledger, "user@example.com", &mixed, now).await;

    let decision = engine.evaluate("user@example.com", now).await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::DailyLimit));
    assert_eq!(decision.daily_count, 12);
    // The window clears when the oldest attempt (12h ago) ages out of the
    // 24h lookback.
    assert_eq!(decision.next_allowed_at, Some(now + Duration::hours(12)));
    assert_eq!(decision.wait_minutes, Some(12 * 60));
}

#[test_log::test(tokio::test)]
async fn daily_window_slides_rather_than_resetting() {
    // One attempt just inside the 24h lookback, one just outside: only the
    // inside one counts, exactly matching a manual count over the window.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        "user@example.com",
        &[
            (Success, Duration::hours(24) + Duration::minutes(1)),
            (Success, Duration::hours(23) + Duration::minutes(59)),
        ],
        now,
    )
    .await;

    let window_count = ledger
        .count_since("user@example.com", now - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(window_count, 1);

    let decision = engine.evaluate("user@example.com", now).await;
    assert!(decision.allowed);
    assert_eq!(decision.daily_count, 1);
}

#[test_log::test(tokio::test)]
async fn warning_thresholds_fire_before_hard_limits() {
    let policy = test_policy();
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let engine = engine_over(&ledger);
    let now = OffsetDateTime::now_utc();

    // 2 consecutive failures: allowed, no warning yet.
    seed_attempts(
        &ledger,
        "calm@example.com",
        &[
            (Failure, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;
    let decision = engine.evaluate("calm@example.com", now).await;
    assert!(decision.allowed);
    assert!(!decision.nearing_limits(&policy));

    // 3 consecutive failures: still allowed, but the banner threshold hit.
    seed_attempts(
        &ledger,
        "warned@example.com",
        &[
            (Failure, Duration::minutes(3)),
            (Failure, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;
    let decision = engine.evaluate("warned@example.com", now).await;
    assert!(decision.allowed);
    assert!(decision.nearing_limits(&policy));

    // 10 successes spread over the day: daily warning threshold hit.
    let successes: Vec<_> = (1..=10).map(|i| (Success, Duration::hours(i))).collect();
    seed_attempts(&ledger, "busy@example.com", &successes, now).await;
    let decision = engine.evaluate("busy@example.com", now).await;
    assert!(decision.allowed);
    assert!(decision.nearing_limits(&policy));
}

/// Every read fails, simulating a ledger outage.
struct FailingLedger;

#[async_trait]
impl AttemptStore for FailingLedger {
    async fn record(&self, _attempt: &AttemptRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }

    async fn since(
        &self,
        _identity: &str,
        _cutoff: OffsetDateTime,
        _limit: u32,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }

    async fn count_since(
        &self,
        _identity: &str,
        _cutoff: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }

    async fn oldest_since(
        &self,
        _identity: &str,
        _cutoff: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }

    async fn summary(&self, _identity: &str) -> Result<AttemptTotals, StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }

    async fn purge_older_than(&self, _cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("injected fault".to_string()))
    }
}

#[test_log::test(tokio::test)]
async fn ledger_outage_fails_open() {
    // Chosen behavior: an unreadable ledger must not lock users out, so the
    // evaluation allows with zeroed counters.
    let engine = ThrottleEngine::new(Arc::new(FailingLedger), test_policy());

    let decision = engine
        .evaluate("user@example.com", OffsetDateTime::now_utc())
        .await;

    assert!(decision.allowed);
    assert_eq!(decision.consecutive_count, 0);
    assert_eq!(decision.daily_count, 0);
}
