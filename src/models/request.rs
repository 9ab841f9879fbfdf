//! # Verification Request Entity
//!
//! A verification request is the token-bearing row minted once the throttle
//! approves an identity. At most one request per identity may be `pending` at
//! any instant: creating a new one supersedes (expires) all prior pending
//! requests for that identity. No request ever transitions out of `verified`
//! or `expired`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::utils::constant::REQUEST_TTL;
use crate::utils::token::generate_token;

/// Lifecycle status of a verification request.
///
/// This enum corresponds directly to the PostgreSQL `request_status` enum
/// type defined in the database migrations.
///
/// # Status Flow
///
/// - `Pending` - token minted, awaiting confirmation
/// - `Verified` - confirmed through the token before expiry (terminal)
/// - `Expired` - TTL timeout, supersession, or explicit invalidation (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Verified,
    Expired,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Verified => "verified",
            RequestStatus::Expired => "expired",
        };
        write!(f, "{status_str}")
    }
}

impl RequestStatus {
    /// Terminal statuses admit no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A token-backed verification request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub identity: String,
    /// High-entropy redeemable token, unique across the system's lifetime.
    pub token: String,
    /// Opaque caller data restored on confirmation.
    pub payload: serde_json::Value,
    pub status: RequestStatus,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub verified_at: Option<OffsetDateTime>,
    /// Caller data supplied at confirmation time.
    pub completion: Option<serde_json::Value>,
}

impl VerificationRequest {
    /// Mints a fresh pending request. Token generation happens fully in
    /// memory; nothing is observable until the row is persisted.
    pub fn mint(identity: &str, payload: serde_json::Value, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            token: generate_token(),
            payload,
            status: RequestStatus::Pending,
            expires_at: now + REQUEST_TTL,
            created_at: now,
            verified_at: None,
            completion: None,
        }
    }

    #[inline]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}
