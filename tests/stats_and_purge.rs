mod common;

use std::sync::Arc;

use common::{seed_attempts, test_policy};
use time::{Duration, OffsetDateTime};
use verigate::models::AttemptOutcome::{Failure, Success};
use verigate::services::janitor::RetentionJanitor;
use verigate::services::stats::StatsAggregator;
use verigate::storage::{AttemptStore, InMemoryAttemptStore};

const IDENTITY: &str = "user@example.com";

#[test_log::test(tokio::test)]
async fn stats_roll_up_the_full_history() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let aggregator = StatsAggregator::new(Arc::clone(&ledger) as _, test_policy());
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        IDENTITY,
        &[
            (Success, Duration::hours(30)), // outside the daily window
            (Failure, Duration::hours(3)),
            (Success, Duration::hours(2)),
            (Failure, Duration::hours(1)),
        ],
        now,
    )
    .await;

    let stats = aggregator.stats(IDENTITY, now).await.unwrap();

    assert_eq!(stats.total_attempts, 4);
    assert_eq!(stats.successful_attempts, 2);
    assert_eq!(stats.failed_attempts, 2);
    assert_eq!(stats.today_attempts, 3);
    assert_eq!(stats.last_attempt_at, Some(now - Duration::hours(1)));
    // Nothing is blocking this identity right now.
    assert!(stats.next_allowed_at.is_none());
}

#[test_log::test(tokio::test)]
async fn stats_expose_the_breaker_release_time() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let aggregator = StatsAggregator::new(Arc::clone(&ledger) as _, test_policy());
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        IDENTITY,
        &[
            (Failure, Duration::minutes(4)),
            (Failure, Duration::minutes(3)),
            (Failure, Duration::minutes(2)),
            (Failure, Duration::minutes(1)),
        ],
        now,
    )
    .await;

    let stats = aggregator.stats(IDENTITY, now).await.unwrap();

    assert_eq!(stats.next_allowed_at, Some(now + Duration::minutes(14)));
}

#[test_log::test(tokio::test)]
async fn stats_never_write_to_the_ledger() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let aggregator = StatsAggregator::new(Arc::clone(&ledger) as _, test_policy());
    let now = OffsetDateTime::now_utc();

    seed_attempts(&ledger, IDENTITY, &[(Failure, Duration::hours(1))], now).await;

    // Polling at arbitrary frequency leaves the ledger untouched.
    for _ in 0..5 {
        aggregator.stats(IDENTITY, now).await.unwrap();
    }
    assert_eq!(ledger.summary(IDENTITY).await.unwrap().total, 1);
}

#[test_log::test(tokio::test)]
async fn purge_removes_only_rows_past_the_horizon() {
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let janitor = RetentionJanitor::new(Arc::clone(&ledger) as _, test_policy());
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        IDENTITY,
        &[
            (Failure, Duration::days(40)),
            (Success, Duration::days(10)),
            (Success, Duration::hours(1)),
        ],
        now,
    )
    .await;

    // Retention is 30 days: only the 40-day-old row goes.
    let purged = janitor.run(now).await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(ledger.summary(IDENTITY).await.unwrap().total, 2);

    // Back-to-back runs are idempotent.
    let purged_again = janitor.run(now).await.unwrap();
    assert_eq!(purged_again, 0);
    assert_eq!(ledger.summary(IDENTITY).await.unwrap().total, 2);
}

#[test_log::test(tokio::test)]
async fn overlapping_purges_do_not_double_count() {
    // Two janitor ticks racing over the same horizon: rows are deleted once
    // in total, whichever run gets them.
    let ledger = Arc::new(InMemoryAttemptStore::new());
    let janitor = RetentionJanitor::new(Arc::clone(&ledger) as _, test_policy());
    let now = OffsetDateTime::now_utc();

    seed_attempts(
        &ledger,
        IDENTITY,
        &[
            (Failure, Duration::days(35)),
            (Failure, Duration::days(33)),
            (Success, Duration::hours(2)),
        ],
        now,
    )
    .await;

    let (a, b) = tokio::join!(janitor.run(now), janitor.run(now));
    assert_eq!(a.unwrap() + b.unwrap(), 2);
    assert_eq!(ledger.summary(IDENTITY).await.unwrap().total, 1);
}
