//! # Identity Validation Utilities
//!
//! Validates that an identity is a deliverable email address before any
//! ledger traffic happens, with an optional domain allow-list for deployments
//! restricted to specific organizations.

use std::env;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidateEmail;

/// Optional domain allow-list regex
///
/// Built from the `ALLOWED_DOMAINS` environment variable, a colon-separated
/// list of permitted email domains (e.g. "example.com:university.edu").
/// When unset, any syntactically valid address is accepted.
static DOMAIN_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let allowed_domains_str = env::var("ALLOWED_DOMAINS").ok()?;

    let escaped_domains: Vec<String> = allowed_domains_str
        .split(':')
        .map(regex::escape) // encode special chars like period
        .collect();
    let domains_pattern = escaped_domains.join("|");
    let pattern = format!(r"^[a-zA-Z0-9._%+-]+@({domains_pattern})$");

    Some(Regex::new(&pattern).expect("Failed to compile email domain regex"))
});

/// Returns true when `identity` may enter the verification flow.
pub fn identity_permitted(identity: &str) -> bool {
    if !identity.validate_email() {
        return false;
    }

    match DOMAIN_REGEX.as_ref() {
        Some(regex) => regex.is_match(identity),
        None => true,
    }
}
