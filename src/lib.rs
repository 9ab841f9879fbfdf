//! # Verigate - Verification Request Throttling
//!
//! Decides, for a given identity (an email address), whether a new "send me a
//! verification link" request may proceed, based on a sliding history of
//! prior attempts, overlapping quota policies, and environment-tunable
//! thresholds. Minted requests are token-backed, supersede older pending
//! ones, and are redeemed through a separate verify/confirm step.
//!
//! ## Modules
//!
//! - [`error`] - Typed error taxonomy shared across the crate
//! - [`models`] - Attempt records, requests, policy, and decisions
//! - [`services`] - Throttle engine, request lifecycle, stats, janitor
//! - [`storage`] - Postgres and in-memory repository implementations
//! - [`utils`] - Constants, token generation, identity validation

pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use std::env;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::models::PolicyConfig;
use crate::services::delivery::{DeliverySender, ExternalSender, LogSender};
use crate::services::lifecycle::VerificationService;
use crate::storage::{PgAttemptStore, PgRequestStore};

/// Creates a verification service with default delivery configuration.
///
/// This is a convenience function that calls [`service_with_sender`] with no
/// custom sender, causing it to auto-detect the appropriate transport based
/// on the `APP_ENV` environment variable.
#[inline]
pub fn service(db_pool: PgPool) -> VerificationService {
    service_with_sender(db_pool, None)
}

/// Creates a verification service over Postgres-backed stores.
///
/// # Arguments
///
/// * `db_pool` - PostgreSQL database connection pool
/// * `sender` - Optional custom delivery transport. If None, auto-detects
///   based on APP_ENV
///
/// # Environment Variables
///
/// - `APP_ENV` - "production" uses ExternalSender, otherwise LogSender (mock)
/// - `DELIVERY_API_URL` - Required in production for the external transport
/// - `DELIVERY_API_KEY` - Required in production for the external transport
/// - `SENDER_ADDRESS` - Required in production for the external transport
/// - `THROTTLE_*` - Optional policy threshold overrides (see
///   [`PolicyConfig::from_env`])
/// - `ALLOWED_DOMAINS` - Optional colon-separated identity domain allow-list
pub fn service_with_sender(
    db_pool: PgPool,
    sender: Option<Arc<dyn DeliverySender>>,
) -> VerificationService {
    let sender: Arc<dyn DeliverySender> = if let Some(sender) = sender {
        sender
    } else {
        let app_env = env::var("APP_ENV")
            .expect("Env variable `APP_ENV` should be set")
            .to_ascii_lowercase();

        if app_env == "production" {
            info!("Running in production mode with [ExternalSender]");
            let api_url = env::var("DELIVERY_API_URL")
                .expect("Env variable `DELIVERY_API_URL` should be set");
            let api_key = env::var("DELIVERY_API_KEY")
                .expect("Env variable `DELIVERY_API_KEY` should be set");
            let sender_address =
                env::var("SENDER_ADDRESS").expect("Env variable `SENDER_ADDRESS` should be set");
            Arc::new(ExternalSender::new(api_url, api_key, sender_address))
        } else {
            info!("Running in development mode with [LogSender (Mock)]");
            Arc::new(LogSender)
        }
    };

    let policy = PolicyConfig::from_env().expect("Invalid throttle policy configuration");

    let ledger = Arc::new(PgAttemptStore::new(db_pool.clone()));
    let requests = Arc::new(PgRequestStore::new(db_pool));

    VerificationService::new(policy, ledger, requests, sender)
}
