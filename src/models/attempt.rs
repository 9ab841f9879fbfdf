//! # Attempt Ledger Types
//!
//! This module defines the immutable attempt record written for every
//! throttling-relevant event, plus the rollup totals used by the stats
//! aggregator. Records are append-only facts: once written they are never
//! mutated or reordered, and decision logic always reads them newest-first.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Outcome of a single verification attempt.
///
/// This enum corresponds directly to the PostgreSQL `attempt_outcome` enum
/// type defined in the database migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "attempt_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// A verification request was minted (delivery may still have failed).
    Success,
    /// The request was denied or could not be persisted.
    Failure,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "success"),
            AttemptOutcome::Failure => write!(f, "failure"),
        }
    }
}

/// One immutable row in the attempt ledger.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttemptRecord {
    /// The key the throttle is scoped to (an email address in this system).
    pub identity: String,
    /// Client IP, recorded for audit only. Never used for scoring.
    pub ip_address: Option<String>,
    /// Client user agent, recorded for audit only.
    pub user_agent: Option<String>,
    /// Attempt category tag, e.g. `email_verification`.
    pub kind: String,
    pub outcome: AttemptOutcome,
    /// Human-readable detail for failures and delivery problems.
    pub error_detail: Option<String>,
    pub created_at: OffsetDateTime,
}

impl AttemptRecord {
    /// Builds a bare record with no client metadata attached.
    pub fn new(
        identity: impl Into<String>,
        kind: impl Into<String>,
        outcome: AttemptOutcome,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            identity: identity.into(),
            ip_address: None,
            user_agent: None,
            kind: kind.into(),
            outcome,
            error_detail: None,
            created_at,
        }
    }

    pub fn with_client_info(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }
}

/// Optional request metadata captured alongside an attempt for audit.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// All-time rollup for one identity, produced by `AttemptStore::summary`.
#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
pub struct AttemptTotals {
    pub total: i64,
    pub successes: i64,
    pub failures: i64,
    pub last_attempt_at: Option<OffsetDateTime>,
}
