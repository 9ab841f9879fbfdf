//! # Postgres Storage
//!
//! Production implementations of [`AttemptStore`] and [`RequestStore`] over a
//! `sqlx` connection pool. The schema lives in `migrations/`; queries bind
//! the enum types (`attempt_outcome`, `request_status`) directly.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttemptRecord, AttemptTotals, VerificationRequest};
use crate::storage::{AttemptStore, RequestStore};

pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn record(&self, attempt: &AttemptRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verification_attempts
                (identity, ip_address, user_agent, kind, outcome, error_detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&attempt.identity)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(&attempt.kind)
        .bind(attempt.outcome)
        .bind(&attempt.error_detail)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let attempts = sqlx::query_as::<_, AttemptRecord>(
            r#"
            SELECT identity, ip_address, user_agent, kind, outcome, error_detail, created_at
            FROM verification_attempts
            WHERE identity = $1 AND created_at >= $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(identity)
        .bind(cutoff)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn count_since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM verification_attempts
            WHERE identity = $1 AND created_at >= $2
            "#,
        )
        .bind(identity)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn oldest_since(
        &self,
        identity: &str,
        cutoff: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        let oldest = sqlx::query_scalar::<_, Option<OffsetDateTime>>(
            r#"
            SELECT MIN(created_at)
            FROM verification_attempts
            WHERE identity = $1 AND created_at >= $2
            "#,
        )
        .bind(identity)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(oldest)
    }

    async fn summary(&self, identity: &str) -> Result<AttemptTotals, StoreError> {
        let totals = sqlx::query_as::<_, AttemptTotals>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE outcome = 'success') AS successes,
                COUNT(*) FILTER (WHERE outcome = 'failure') AS failures,
                MAX(created_at) AS last_attempt_at
            FROM verification_attempts
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM verification_attempts
            WHERE created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const REQUEST_COLUMNS: &str =
    "id, identity, token, payload, status, expires_at, created_at, verified_at, completion";

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, request: &VerificationRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verification_requests
                (id, identity, token, payload, status, expires_at, created_at, verified_at, completion)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request.id)
        .bind(&request.identity)
        .bind(&request.token)
        .bind(&request.payload)
        .bind(request.status)
        .bind(request.expires_at)
        .bind(request.created_at)
        .bind(request.verified_at)
        .bind(&request.completion)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        let request = sqlx::query_as::<_, VerificationRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM verification_requests WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn latest_pending(
        &self,
        identity: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        let request = sqlx::query_as::<_, VerificationRequest>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM verification_requests
            WHERE identity = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn expire_pending(&self, identity: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE verification_requests
            SET status = 'expired'
            WHERE identity = $1 AND status = 'pending'
            "#,
        )
        .bind(identity)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_expired(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE verification_requests
            SET status = 'expired'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        verified_at: OffsetDateTime,
        completion: &serde_json::Value,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE verification_requests
            SET status = 'verified', verified_at = $2, completion = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(verified_at)
        .bind(completion)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_count(&self, identity: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM verification_requests
            WHERE identity = $1 AND status = 'pending'
            "#,
        )
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
