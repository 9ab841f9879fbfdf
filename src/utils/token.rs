//! # Token Generation

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::utils::constant::TOKEN_LENGTH;

/// Generates a high-entropy verification token.
///
/// [`TOKEN_LENGTH`] alphanumeric characters from the thread-local CSPRNG,
/// roughly 285 bits of entropy. Uniqueness is additionally enforced by the
/// database constraint on the token column.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
