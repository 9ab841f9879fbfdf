//! # In-Memory Storage
//!
//! `DashMap`-backed implementations used by tests and local development.
//! They honor the same contracts as the Postgres stores: append-only
//! attempts, newest-first reads, idempotent purges, and terminal request
//! statuses that never transition again.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptOutcome, AttemptRecord, AttemptTotals, RequestStatus, VerificationRequest};
use crate::storage::{AttemptStore, RequestStore};

/// Attempt ledger held entirely in process memory.
#[derive(Default)]
pub struct InMemoryAttemptStore {
    attempts: DashMap<String, Vec<AttemptRecord>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn record(&self, attempt: &AttemptRecord) -> Result<(), StoreError> {
        self.attempts
            .entry(attempt.identity.clone())
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let mut matching: Vec<AttemptRecord> = self
            .attempts
            .get(identity)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|a| a.created_at >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn count_since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let count = self
            .attempts
            .get(identity)
            .map(|entry| entry.iter().filter(|a| a.created_at >= cutoff).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn oldest_since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        let oldest = self.attempts.get(identity).and_then(|entry| {
            entry
                .iter()
                .filter(|a| a.created_at >= cutoff)
                .map(|a| a.created_at)
                .min()
        });
        Ok(oldest)
    }

    async fn summary(&self, identity: &str) -> Result<AttemptTotals, StoreError> {
        let totals = self
            .attempts
            .get(identity)
            .map(|entry| {
                let successes = entry
                    .iter()
                    .filter(|a| a.outcome == AttemptOutcome::Success)
                    .count() as i64;
                let total = entry.len() as i64;
                AttemptTotals {
                    total,
                    successes,
                    failures: total - successes,
                    last_attempt_at: entry.iter().map(|a| a.created_at).max(),
                }
            })
            .unwrap_or_default();
        Ok(totals)
    }

    async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut purged = 0u64;
        for mut entry in self.attempts.iter_mut() {
            let before = entry.len();
            entry.retain(|a| a.created_at >= cutoff);
            purged += (before - entry.len()) as u64;
        }
        Ok(purged)
    }
}

/// Verification-request store held entirely in process memory.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: DashMap<Uuid, VerificationRequest>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: &VerificationRequest) -> Result<(), StoreError> {
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        let request = self
            .requests
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.clone());
        Ok(request)
    }

    async fn latest_pending(
        &self,
        identity: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        let request = self
            .requests
            .iter()
            .filter(|entry| entry.identity == identity && entry.status == RequestStatus::Pending)
            .max_by_key(|entry| entry.created_at)
            .map(|entry| entry.clone());
        Ok(request)
    }

    async fn expire_pending(&self, identity: &str) -> Result<u64, StoreError> {
        let mut expired = 0u64;
        for mut entry in self.requests.iter_mut() {
            if entry.identity == identity && entry.status == RequestStatus::Pending {
                entry.status = RequestStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn mark_expired(&self, id: Uuid) -> Result<u64, StoreError> {
        if let Some(mut request) = self.requests.get_mut(&id)
            && !request.status.is_terminal()
        {
            request.status = RequestStatus::Expired;
            return Ok(1);
        }
        Ok(0)
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        verified_at: OffsetDateTime,
        completion: &serde_json::Value,
    ) -> Result<u64, StoreError> {
        if let Some(mut request) = self.requests.get_mut(&id)
            && !request.status.is_terminal()
        {
            request.status = RequestStatus::Verified;
            request.verified_at = Some(verified_at);
            request.completion = Some(completion.clone());
            return Ok(1);
        }
        Ok(0)
    }

    async fn pending_count(&self, identity: &str) -> Result<i64, StoreError> {
        let count = self
            .requests
            .iter()
            .filter(|entry| entry.identity == identity && entry.status == RequestStatus::Pending)
            .count();
        Ok(count as i64)
    }
}
