#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use verigate::models::{AttemptOutcome, AttemptRecord, PolicyConfig};
use verigate::services::delivery::{DeliveryError, DeliverySender};
use verigate::services::lifecycle::VerificationService;
use verigate::storage::{AttemptStore, InMemoryAttemptStore, InMemoryRequestStore};

/// A mock transport that records delivered links for assertions and can be
/// told to fail the next delivery.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<SentLink>>,
    fail_next: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SentLink {
    pub identity: String,
    pub token: String,
    pub payload: Value,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_sent(&self) -> Option<SentLink> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Makes the next `deliver` call fail with a simulated outage.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeliverySender for MockSender {
    async fn deliver(
        &self,
        identity: &str,
        token: &str,
        payload: &Value,
    ) -> Result<(), DeliveryError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DeliveryError::SendFailed("simulated outage".to_string()));
        }

        self.sent.lock().unwrap().push(SentLink {
            identity: identity.to_string(),
            token: token.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Isolated service instance over in-memory stores, with handles to every
/// collaborator so tests can seed and inspect state directly.
pub struct TestHarness {
    pub service: VerificationService,
    pub ledger: Arc<InMemoryAttemptStore>,
    pub requests: Arc<InMemoryRequestStore>,
    pub sender: Arc<MockSender>,
    pub policy: PolicyConfig,
}

/// Thresholds used across the integration tests: breaker at 4 consecutive
/// failures with a 15 minute cooldown, 12 attempts per rolling day, 5 minute
/// minimum interval.
pub fn test_policy() -> PolicyConfig {
    PolicyConfig {
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

pub fn harness() -> TestHarness {
    harness_with_policy(test_policy())
}

pub fn harness_with_policy(policy: PolicyConfig) -> TestHarness {
    policy.validate().expect("test policy should be valid");

    let ledger = Arc::new(InMemoryAttemptStore::new());
    let requests = Arc::new(InMemoryRequestStore::new());
    let sender = Arc::new(MockSender::new());

    let service = VerificationService::new(
        policy.clone(),
        Arc::clone(&ledger) as Arc<dyn AttemptStore>,
        Arc::clone(&requests) as _,
        Arc::clone(&sender) as _,
    );

    TestHarness {
        service,
        ledger,
        requests,
        sender,
        policy,
    }
}

/// Seeds one attempt per `(outcome, age)` pair, where `age` is how long
/// before `now` the attempt happened.
pub async fn seed_attempts(
    ledger: &InMemoryAttemptStore,
    identity: &str,
    entries: &[(AttemptOutcome, Duration)],
    now: OffsetDateTime,
) {
    for (outcome, age) in entries {
        let attempt = AttemptRecord::new(identity, "email_verification", *outcome, now - *age);
        ledger
            .record(&attempt)
            .await
            .expect("seeding the in-memory ledger should not fail");
    }
}
