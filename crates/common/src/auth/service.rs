//! High-level OAuth service
//!
//! Thin facade over [`TokenManager`] for code that only needs "the current
//! token" and "what am I allowed to do", without driving the lifecycle.

use tracing::debug;

use super::jwt;
use super::scopes::parse_authority;
use super::token_manager::{TokenManager, TokenManagerError};
use super::types::{GrantedAuthority, TokenClaims, TokenSet};

/// Read-mostly view of the token lifecycle
#[derive(Debug, Clone)]
pub struct OAuthService {
    manager: TokenManager,
}

impl OAuthService {
    /// Facade over `manager`
    #[must_use]
    pub fn new(manager: TokenManager) -> Self {
        Self { manager }
    }

    /// Underlying token manager
    #[must_use]
    pub fn token_manager(&self) -> &TokenManager {
        &self.manager
    }

    /// Drop the current tokens and request new ones
    ///
    /// # Errors
    /// Propagates the [`TokenManagerError`] of the new request.
    pub async fn refresh_access_token(&self) -> Result<TokenSet, TokenManagerError> {
        self.manager.remove_tokens();
        self.manager.request_access_token(None).await
    }

    /// Wait for tokens and return the bearer token
    ///
    /// # Errors
    /// Returns [`TokenManagerError::TokenMissing`] when the last request was
    /// rejected.
    pub async fn access_token(&self) -> Result<String, TokenManagerError> {
        Ok(self.manager.wait_tokens_set().await?.access_token)
    }

    /// Wait for tokens and decode the bearer token's claims
    ///
    /// # Errors
    /// Returns [`TokenManagerError::InvalidToken`] when the token is not a
    /// decodable JWT.
    pub async fn access_token_claims(&self) -> Result<TokenClaims, TokenManagerError> {
        let token = self.access_token().await?;
        Ok(jwt::decode_claims(&token)?)
    }

    /// Authorities granted by the current, unexpired token
    ///
    /// Waits for tokens. Returns an empty list when the wait is rejected,
    /// when the token is missing, expired or undecodable.
    pub async fn granted_authorities(&self) -> Vec<GrantedAuthority> {
        self.granted_authorities_at(jwt::unix_now()).await
    }

    /// [`granted_authorities`](Self::granted_authorities) against a fixed clock
    pub async fn granted_authorities_at(&self, now_secs: i64) -> Vec<GrantedAuthority> {
        let Ok(tokens) = self.manager.wait_tokens_set().await else {
            return Vec::new();
        };
        if !tokens.has_access_token() {
            return Vec::new();
        }

        let claims = match jwt::is_token_expired(&tokens.access_token, 0, now_secs) {
            Ok(false) => match jwt::decode_claims(&tokens.access_token) {
                Ok(claims) => claims,
                Err(_) => return Vec::new(),
            },
            Ok(true) => {
                debug!("Access token expired; no authorities granted");
                return Vec::new();
            }
            Err(err) => {
                debug!(error = %err, "Access token undecodable; no authorities granted");
                return Vec::new();
            }
        };

        let namespace = &self.manager.config().authority_namespace;
        claims
            .scope
            .map(|scope| self.manager.filter_scope_authorities(scope))
            .unwrap_or_default()
            .iter()
            .filter_map(|authority| parse_authority(authority, namespace))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::service.
    use std::sync::Arc;

    use serde_json::json;

    use portal_sso_domain::OAuthConfig;

    use super::*;
    use crate::auth::channel::MessageBus;
    use crate::testing::{fake_jwt, ScriptStep, ScriptedBrowsingEngine};

    fn service_with(token: &str) -> OAuthService {
        let bus = MessageBus::new();
        let engine = Arc::new(ScriptedBrowsingEngine::new(bus.clone()));
        engine.push_step(ScriptStep::relay_token(token, "guidewire.edge.policy.write.all"));
        let config = OAuthConfig::new(
            "https://idp.example".into(),
            "X".into(),
            "https://portal.example".into(),
        );
        OAuthService::new(TokenManager::new(config, engine, bus))
    }

    /// Validates authority parsing from the token's own scope claim.
    ///
    /// Assertions:
    /// - Confirms the array-shaped scope claim is filtered and parsed.
    #[tokio::test(start_paused = true)]
    async fn test_granted_authorities_from_claims() {
        let token = fake_jwt(&json!({
            "exp": 5000,
            "scope": ["openid", "guidewire.edge.policy.write.all", "guidewire.edge.claim.read.own"]
        }));
        let service = service_with(&token);
        service.token_manager().request_access_token(None).await.unwrap();

        let authorities = service.granted_authorities_at(1000).await;

        assert_eq!(
            authorities,
            vec![
                GrantedAuthority {
                    authority_type: "POLICY".into(),
                    value: "write".into(),
                    level: "all".into()
                },
                GrantedAuthority {
                    authority_type: "CLAIM".into(),
                    value: "read".into(),
                    level: "own".into()
                },
            ]
        );
    }

    /// Validates that expired or opaque tokens grant nothing.
    ///
    /// Assertions:
    /// - An expired JWT yields no authorities.
    /// - An opaque token yields no authorities.
    #[tokio::test(start_paused = true)]
    async fn test_granted_authorities_empty_when_unusable() {
        let expired = fake_jwt(&json!({"exp": 500, "scope": "guidewire.edge.policy.write.all"}));
        let service = service_with(&expired);
        service.token_manager().request_access_token(None).await.unwrap();
        assert!(service.granted_authorities_at(1000).await.is_empty());

        let opaque = service_with("abc");
        opaque.token_manager().request_access_token(None).await.unwrap();
        assert!(opaque.granted_authorities_at(1000).await.is_empty());
    }

    /// Validates `access_token_claims` on an opaque token.
    ///
    /// Assertions:
    /// - Confirms the error is `InvalidToken`.
    #[tokio::test(start_paused = true)]
    async fn test_access_token_claims_rejects_opaque_token() {
        let service = service_with("abc");
        service.token_manager().request_access_token(None).await.unwrap();

        assert_eq!(service.access_token().await.unwrap(), "abc");
        assert!(matches!(
            service.access_token_claims().await,
            Err(TokenManagerError::InvalidToken(_))
        ));
    }
}
