//! JWT claim decoding
//!
//! Decodes the payload of an access token without verifying its signature.
//! The portal never trusts these claims for authorization; it only reads
//! `iat`/`exp` for refresh scheduling and `origin`/`scope` for routing.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use super::types::TokenClaims;
use crate::error::{ErrorClassification, ErrorSeverity};

/// Errors produced while decoding a JWT
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("JWT must have 3 parts, found {0}")]
    MalformedParts(usize),

    #[error("Cannot decode the token payload: {0}")]
    Encoding(String),

    #[error("Token payload is not valid claims JSON: {0}")]
    Claims(String),
}

impl ErrorClassification for JwtError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

/// Decode the claims of a `header.payload.signature` token
///
/// The payload is base64url, with or without `=` padding.
///
/// # Errors
/// Returns [`JwtError`] when the token does not have three parts or the
/// payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, JwtError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(JwtError::MalformedParts(parts.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| JwtError::Encoding(e.to_string()))?;

    serde_json::from_slice(&payload).map_err(|e| JwtError::Claims(e.to_string()))
}

/// Check whether the token expires within `offset_secs` of `now_secs`
///
/// A token without an `exp` claim never expires.
///
/// # Errors
/// Returns [`JwtError`] when the token cannot be decoded.
pub fn is_token_expired(token: &str, offset_secs: i64, now_secs: i64) -> Result<bool, JwtError> {
    let claims = decode_claims(token)?;
    Ok(match claims.exp {
        Some(exp) => exp <= now_secs.saturating_add(offset_secs),
        None => false,
    })
}

/// Current time in seconds since the epoch
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
