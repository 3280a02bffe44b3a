//! CSRF nonce and state
//!
//! Every authorize attempt gets a fresh 16-character alphanumeric nonce. The
//! state parameter is the nonce itself, or `"{nonce}|{caller_state}"` when the
//! caller wants to round-trip a value (e.g. the page to return to).

use rand::Rng;

use portal_sso_domain::constants::{NONCE_ALPHABET, NONCE_LENGTH};
use portal_sso_domain::CsrfValidation;

use super::types::PendingAuthorization;

/// Separator between the nonce and the caller state in the `state` parameter
pub const STATE_SEPARATOR: char = '|';

/// Generate a random alphanumeric nonce
#[must_use]
pub fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LENGTH)
        .map(|_| char::from(NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())]))
        .collect()
}

impl PendingAuthorization {
    /// Generate the nonce/state pair for a new authorize attempt
    #[must_use]
    pub fn generate(caller_state: Option<&str>) -> Self {
        let nonce = generate_nonce();
        let state = match caller_state {
            Some(s) if !s.is_empty() => format!("{nonce}{STATE_SEPARATOR}{s}"),
            _ => nonce.clone(),
        };
        Self { nonce, state }
    }

    /// Check the value echoed by the provider
    ///
    /// Returns the name of the mismatching parameter on failure. A missing
    /// echo is a mismatch.
    ///
    /// # Errors
    /// Returns `Err("nonce")` or `Err("state")` when the echoed value differs
    /// from the generated one.
    pub fn verify(&self, mode: CsrfValidation, echoed: Option<&str>) -> Result<(), &'static str> {
        let parameter = match mode {
            CsrfValidation::Nonce => "nonce",
            CsrfValidation::State => "state",
        };
        if echoed == Some(self.expected(mode)) {
            Ok(())
        } else {
            Err(parameter)
        }
    }
}

/// Caller state carried by an echoed `state` parameter, if any
#[must_use]
pub fn caller_state(state: &str) -> Option<&str> {
    state.split_once(STATE_SEPARATOR).map(|(_, caller)| caller)
}
