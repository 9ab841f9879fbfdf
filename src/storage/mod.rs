//! # Storage Backends
//!
//! Repository traits for the attempt ledger and the verification-request
//! store, with two implementations each:
//!
//! - **Postgres** (`postgres`) - production backend over a `sqlx` pool
//! - **In-memory** (`memory`) - `DashMap`-backed, for tests and development
//!
//! Stores are injected at construction time so tests run isolated instances
//! in parallel and multi-instance deployments share state only through the
//! real database.

mod memory;
mod postgres;

pub use memory::{InMemoryAttemptStore, InMemoryRequestStore};
pub use postgres::{PgAttemptStore, PgRequestStore};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptRecord, AttemptTotals, VerificationRequest};

/// Append-only record store of every throttling-relevant attempt.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Appends one attempt. Rows are immutable once written.
    async fn record(&self, attempt: &AttemptRecord) -> Result<(), StoreError>;

    /// Up to `limit` attempts for `identity` at or after `cutoff`,
    /// newest-first.
    async fn since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StoreError>;

    /// Number of attempts (any outcome) for `identity` at or after `cutoff`.
    async fn count_since(&self, identity: &str, cutoff: OffsetDateTime)
    -> Result<i64, StoreError>;

    /// Timestamp of the oldest attempt for `identity` at or after `cutoff`,
    /// used to compute the daily window's reset edge.
    async fn oldest_since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StoreError>;

    /// All-time totals for `identity`.
    async fn summary(&self, identity: &str) -> Result<AttemptTotals, StoreError>;

    /// Deletes every attempt strictly older than `cutoff`, returning the
    /// number of rows removed. Idempotent: a second run over the same cutoff
    /// removes nothing.
    async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError>;
}

/// Persistence for token-backed verification requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: &VerificationRequest) -> Result<(), StoreError>;

    /// Unique-token lookup, any status.
    async fn find_by_token(&self, token: &str)
    -> Result<Option<VerificationRequest>, StoreError>;

    /// Most recently created pending request for `identity`, if any.
    async fn latest_pending(
        &self,
        identity: &str,
    ) -> Result<Option<VerificationRequest>, StoreError>;

    /// Supersession: flips every pending request for `identity` to expired,
    /// returning how many were affected.
    async fn expire_pending(&self, identity: &str) -> Result<u64, StoreError>;

    /// Flips a single pending request to expired, returning how many rows
    /// changed. Zero means the request was no longer pending.
    async fn mark_expired(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Flips a pending request to verified, stamping `verified_at` and
    /// storing the completion payload. Returns how many rows changed; zero
    /// means the request was no longer pending and nothing was written, so
    /// callers must not report it as verified.
    async fn mark_verified(
        &self,
        id: Uuid,
        verified_at: OffsetDateTime,
        completion: &serde_json::Value,
    ) -> Result<u64, StoreError>;

    async fn pending_count(&self, identity: &str) -> Result<i64, StoreError>;
}
