//! # Centralized Error Handling
//!
//! This module defines the error taxonomy for the throttling engine. Policy
//! denials and token lookup misses are expected, frequent outcomes: they are
//! always typed `Err` values callers branch on, never panics. Only
//! infrastructure failures on the primary path (persisting the token-bearing
//! request row) are fatal to a call; losing an audit row is not.

use thiserror::Error;

use crate::models::Decision;

/// Errors surfaced by the verification service.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The throttle policy rejected the request. The embedded decision
    /// carries the reason and a human-actionable wait.
    #[error("request denied by throttle policy")]
    Denied(Decision),

    /// The identity is not a deliverable address.
    #[error("identity is not a deliverable address")]
    InvalidIdentity,

    #[error("verification token not found")]
    TokenNotFound,

    #[error("verification token expired")]
    TokenExpired,

    #[error("storage error: {0}")]
    Persistence(#[from] StoreError),
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend unreachable or refusing work, including timed-out writes.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Convenience Result type alias that uses ThrottleError as the error type.
pub type ThrottleResult<T> = Result<T, ThrottleError>;
