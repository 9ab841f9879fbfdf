mod attempt;
mod decision;
mod policy;
mod request;

pub use attempt::{AttemptOutcome, AttemptRecord, AttemptTotals, ClientInfo};
pub use decision::{Decision, DenyReason};
pub use policy::{PolicyConfig, PolicyError};
pub use request::{RequestStatus, VerificationRequest};
