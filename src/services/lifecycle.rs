//! # Request Lifecycle Manager
//!
//! Owns the verification-request entity: creation gated by the throttle
//! engine and the minimum-interval guard, supersession of prior pending
//! requests, token verification, and confirmation.
//!
//! ## Concurrency
//!
//! The throttle check and the subsequent writes are not one atomic storage
//! operation. Within a process, a per-identity advisory lock is held across
//! the whole check-then-write sequence, so a user double-clicking "resend"
//! cannot slip past the minimum interval. Across multiple instances the
//! overshoot is bounded: at worst one extra attempt beyond the configured
//! maximum, reconciled through the shared store on the next evaluation.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ThrottleError, ThrottleResult};
use crate::models::{
    AttemptOutcome, AttemptRecord, ClientInfo, Decision, DenyReason, PolicyConfig, RequestStatus,
    VerificationRequest,
};
use crate::services::delivery::{DeliveryError, DeliverySender};
use crate::services::throttle::ThrottleEngine;
use crate::storage::{AttemptStore, RequestStore};
use crate::utils::constant::{DEFAULT_ATTEMPT_KIND, IDENTITY_LOCK_CAPACITY};
use crate::utils::validator::identity_permitted;

/// Result of a successful `start` call.
#[derive(Debug)]
pub struct StartOutcome {
    pub request_id: Uuid,
    /// The redeemable token. Remains valid even when delivery failed.
    pub token: String,
    /// The throttle decision that approved the request, with counters the
    /// caller can use for warning banners.
    pub decision: Decision,
    /// Present when the transport could not deliver the link. The token is
    /// still redeemable; the caller decides whether to retry out-of-band.
    pub delivery_error: Option<DeliveryError>,
}

pub struct VerificationService {
    policy: PolicyConfig,
    ledger: Arc<dyn AttemptStore>,
    requests: Arc<dyn RequestStore>,
    sender: Arc<dyn DeliverySender>,
    engine: ThrottleEngine,
    /// Per-identity advisory locks serializing check-then-write sequences.
    identity_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    kind: String,
}

impl VerificationService {
    pub fn new(
        policy: PolicyConfig,
        ledger: Arc<dyn AttemptStore>,
        requests: Arc<dyn RequestStore>,
        sender: Arc<dyn DeliverySender>,
    ) -> Self {
        info!("Initializing verification service");

        let engine = ThrottleEngine::new(Arc::clone(&ledger), policy.clone());
        Self {
            policy,
            ledger,
            requests,
            sender,
            engine,
            identity_locks: DashMap::new(),
            kind: DEFAULT_ATTEMPT_KIND.to_string(),
        }
    }

    /// Overrides the attempt category written to the ledger, e.g. to reuse
    /// the service for password-reset links.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Starts a verification flow for `identity`.
    ///
    /// Runs the minimum-interval guard and the throttle engine; on approval,
    /// supersedes older pending requests, mints a token-backed request,
    /// attempts delivery, and records the outcome in the attempt ledger.
    ///
    /// # Errors
    ///
    /// - [`ThrottleError::InvalidIdentity`] - malformed or disallowed address
    /// - [`ThrottleError::Denied`] - a quota or the minimum interval tripped
    /// - [`ThrottleError::Persistence`] - the token-bearing row could not be
    ///   written (fatal, unlike audit-row writes)
    #[instrument(skip(self, payload, client), fields(identity = %identity))]
    pub async fn start(
        &self,
        identity: &str,
        payload: serde_json::Value,
        client: ClientInfo,
        now: OffsetDateTime,
    ) -> ThrottleResult<StartOutcome> {
        if !identity_permitted(identity) {
            warn!("Rejected verification request for malformed identity");
            return Err(ThrottleError::InvalidIdentity);
        }

        let lock = self.lock_for(identity);
        let _guard = lock.lock().await;

        // Minimum-interval guard: keyed off the most recent pending request,
        // not the attempt ledger, so even a clean history cannot re-request
        // faster than the configured spacing.
        if let Some(pending) = self.requests.latest_pending(identity).await? {
            let next_allowed_at = pending.created_at + self.policy.min_interval();
            if now < next_allowed_at {
                let decision = Decision::deny(DenyReason::MinInterval, next_allowed_at, now, 0, 0);
                warn!(
                    wait_minutes = decision.wait_minutes,
                    "Denied: minimum interval between requests not met"
                );
                self.log_attempt(
                    identity,
                    &client,
                    AttemptOutcome::Failure,
                    Some("minimum interval between requests not met"),
                    now,
                )
                .await;
                return Err(ThrottleError::Denied(decision));
            }
        }

        let decision = self.engine.evaluate(identity, now).await;
        if !decision.allowed {
            let detail = decision
                .reason
                .map(|r| format!("throttled: {r}"))
                .unwrap_or_else(|| "throttled".to_string());
            warn!(
                reason = ?decision.reason,
                wait_minutes = decision.wait_minutes,
                "Denied by throttle policy"
            );
            self.log_attempt(
                identity,
                &client,
                AttemptOutcome::Failure,
                Some(&detail),
                now,
            )
            .await;
            return Err(ThrottleError::Denied(decision));
        }

        let superseded = self.requests.expire_pending(identity).await?;
        if superseded > 0 {
            info!(superseded, "Superseded older pending requests");
        }

        let request = VerificationRequest::mint(identity, payload, now);
        if let Err(e) = self.requests.insert(&request).await {
            self.log_attempt(
                identity,
                &client,
                AttemptOutcome::Failure,
                Some("failed to persist verification request"),
                now,
            )
            .await;
            return Err(e.into());
        }

        // Token minted is the primary success signal: a delivery failure is
        // recorded but does not revoke the token, since the caller may still
        // learn it by another channel.
        let delivery_error = match self
            .sender
            .deliver(identity, &request.token, &request.payload)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Delivery failed; token remains redeemable");
                Some(e)
            }
        };

        let detail = delivery_error.as_ref().map(ToString::to_string);
        self.log_attempt(
            identity,
            &client,
            AttemptOutcome::Success,
            detail.as_deref(),
            now,
        )
        .await;

        info!(request_id = %request.id, "Verification request created");
        Ok(StartOutcome {
            request_id: request.id,
            token: request.token,
            decision,
            delivery_error,
        })
    }

    /// Looks up a pending request by token without consuming it, so a token
    /// may be viewed before being finalized.
    ///
    /// A pending request found past its expiry is flipped to `expired` as a
    /// side effect; repeat calls keep returning [`ThrottleError::TokenExpired`].
    /// Already-verified tokens are no longer pending and report
    /// [`ThrottleError::TokenNotFound`].
    #[instrument(skip(self, token))]
    pub async fn verify_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> ThrottleResult<VerificationRequest> {
        let Some(request) = self.requests.find_by_token(token).await? else {
            debug!("Token lookup missed");
            return Err(ThrottleError::TokenNotFound);
        };

        match request.status {
            RequestStatus::Expired => Err(ThrottleError::TokenExpired),
            RequestStatus::Verified => Err(ThrottleError::TokenNotFound),
            RequestStatus::Pending if request.is_expired_at(now) => {
                self.requests.mark_expired(request.id).await?;
                debug!(request_id = %request.id, "Expired pending request on lookup");
                Err(ThrottleError::TokenExpired)
            }
            RequestStatus::Pending => Ok(request),
        }
    }

    /// Finalizes a pending request: transitions it to `verified`, stamps
    /// `verified_at`, and stores the completion payload.
    ///
    /// Runs the same expiry check as [`Self::verify_token`] and is safe to
    /// call repeatedly; a second confirmation returns a typed error.
    #[instrument(skip(self, token, completion))]
    pub async fn confirm(
        &self,
        token: &str,
        completion: serde_json::Value,
        now: OffsetDateTime,
    ) -> ThrottleResult<()> {
        let request = self.verify_token(token, now).await?;
        let updated = self
            .requests
            .mark_verified(request.id, now, &completion)
            .await?;
        if updated == 0 {
            // The request stopped being pending between the lookup and the
            // write, e.g. a concurrent start superseded it. Re-read to report
            // the state the caller actually raced against.
            warn!(request_id = %request.id, "Confirmation lost a race; request no longer pending");
            let current = self.requests.find_by_token(token).await?;
            return Err(match current {
                Some(r) if r.status == RequestStatus::Expired => ThrottleError::TokenExpired,
                _ => ThrottleError::TokenNotFound,
            });
        }
        info!(request_id = %request.id, identity = %request.identity, "Request confirmed");
        Ok(())
    }

    fn lock_for(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        if self.identity_locks.len() > IDENTITY_LOCK_CAPACITY {
            // An entry with extra strong references is currently held by an
            // in-flight start call and must survive the sweep.
            let initial_size = self.identity_locks.len();
            self.identity_locks
                .retain(|_, lock| Arc::strong_count(lock) > 1);
            debug!(
                initial_size,
                final_size = self.identity_locks.len(),
                "Pruned idle identity locks"
            );
        }

        self.identity_locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Best-effort ledger append: losing an audit row must not fail the
    /// caller's primary operation.
    async fn log_attempt(
        &self,
        identity: &str,
        client: &ClientInfo,
        outcome: AttemptOutcome,
        detail: Option<&str>,
        now: OffsetDateTime,
    ) {
        let mut attempt =
            AttemptRecord::new(identity, self.kind.clone(), outcome, now).with_client_info(client);
        if let Some(detail) = detail {
            attempt = attempt.with_detail(detail);
        }

        if let Err(e) = self.ledger.record(&attempt).await {
            warn!(error = %e, %outcome, "Failed to record attempt in ledger");
        }
    }
}
