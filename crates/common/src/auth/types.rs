//! Token and authorization types
//!
//! `TokenSet` is owned by the token manager; callers only ever receive
//! clones. `PendingAuthorization` lives for exactly one authorize attempt.

use serde::{Deserialize, Serialize};

use portal_sso_domain::CsrfValidation;

use super::scopes::ScopeList;

/// Claims decoded from a JWT access token payload
///
/// Only the claims the portal reads are typed; everything else the provider
/// put in the token is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issued-at, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Granted scopes; UAA sends an array, Auth0 a space-delimited string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeList>,

    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Identity provider that issued the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Login name of the subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Claims not modelled above
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenClaims {
    /// Lifetime of the token in seconds (`exp - iat`)
    ///
    /// `None` when either claim is missing or the difference overflows.
    #[must_use]
    pub fn expiry_window_secs(&self) -> Option<i64> {
        match (self.iat, self.exp) {
            (Some(iat), Some(exp)) => exp.checked_sub(iat),
            _ => None,
        }
    }
}

/// The current bearer token and the authorities granted with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Opaque bearer token; empty when the provider granted authorities only
    pub access_token: String,

    /// Scope entries under the portal's authority namespace
    pub authorities: Vec<String>,

    /// Decoded claims, `None` when the token is not a decodable JWT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
}

impl TokenSet {
    /// Token set from its parts
    #[must_use]
    pub fn new(access_token: String, authorities: Vec<String>, claims: Option<TokenClaims>) -> Self {
        Self { access_token, authorities, claims }
    }

    /// `origin` claim of the token
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|c| c.origin.as_deref())
    }

    /// Whether a non-empty access token is present
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// A parsed `<namespace>.<TYPE>.<value>.<level>` authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedAuthority {
    /// Upper-cased authority type (e.g. `POLICY`)
    pub authority_type: String,
    /// Resource the authority applies to (e.g. `policy`)
    pub value: String,
    /// Access level (e.g. `read`, `write`)
    #[serde(rename = "authorityLevel")]
    pub level: String,
}

/// Anti-forgery values generated for a single authorize attempt
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    /// Random value sent as `nonce`
    pub nonce: String,
    /// Nonce, optionally namespaced with the caller's state
    pub state: String,
}

impl PendingAuthorization {
    /// Value the provider must echo back under the given validation mode
    #[must_use]
    pub fn expected(&self, mode: CsrfValidation) -> &str {
        match mode {
            CsrfValidation::Nonce => &self.nonce,
            CsrfValidation::State => &self.state,
        }
    }
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates `TokenClaims` deserialization with mixed scope shapes.
    ///
    /// Assertions:
    /// - Confirms the expiry window is `exp - iat`.
    /// - Confirms unknown claims land in `extra`.
    #[test]
    fn test_claims_deserialize_and_window() {
        let claims: TokenClaims = serde_json::from_value(serde_json::json!({
            "iat": 1000,
            "exp": 1100,
            "scope": ["openid", "guidewire.edge.a.b.c"],
            "origin": "uaa",
            "client_id": "portal"
        }))
        .unwrap();

        assert_eq!(claims.expiry_window_secs(), Some(100));
        assert_eq!(claims.origin.as_deref(), Some("uaa"));
        assert_eq!(claims.extra.get("client_id"), Some(&serde_json::json!("portal")));
    }

    /// Validates `PendingAuthorization::expected` for both validation modes.
    ///
    /// Assertions:
    /// - Nonce mode yields the nonce, state mode yields the state.
    /// - Debug output never reveals either value.
    #[test]
    fn test_pending_expected_value() {
        let pending = PendingAuthorization { nonce: "n0nce".into(), state: "n0nce|home".into() };

        assert_eq!(pending.expected(CsrfValidation::Nonce), "n0nce");
        assert_eq!(pending.expected(CsrfValidation::State), "n0nce|home");
        assert!(!format!("{pending:?}").contains("n0nce"));
    }
}
