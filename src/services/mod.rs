//! # Business Logic Services
//!
//! Core services of the throttling engine. Services encapsulate
//! domain-specific functionality behind explicit construction so tests can
//! run isolated instances in parallel.
//!
//! ## Available Services
//!
//! - **Throttle** (`throttle`) - the quota decision engine
//! - **Lifecycle** (`lifecycle`) - verification-request creation and redemption
//! - **Delivery** (`delivery`) - link transport with multiple implementations
//! - **Stats** (`stats`) - read-only per-identity rollups
//! - **Janitor** (`janitor`) - retention purges over the attempt ledger

pub mod delivery;
pub mod janitor;
pub mod lifecycle;
pub mod stats;
pub mod throttle;
