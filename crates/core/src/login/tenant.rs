//! Multi-tenant portal login
//!
//! Credentials go straight to the tenant's authorize endpoint. The only
//! failure told apart from the rest is a locked account, reported as a `403`
//! whose status text mentions the lock. HTTP clients that cannot see the
//! server's reason phrase fall back to the response body.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use portal_sso_domain::constants::{
    ACCOUNT_LOCKED_MARKER, TENANT_AUTHORIZE_PATH, TENANT_CLIENT_ID, TENANT_LOGOUT_PATH,
};
use portal_sso_domain::{Credentials, LogoutReason, UserProfile};

use super::{AuthServiceError, PortalAuthenticator};
use crate::ports::FormResponse;
use crate::session::AuthSession;

const FORBIDDEN: u16 = 403;

/// Portal login for a tenant behind a shared SSO front
#[derive(Debug)]
pub struct TenantAuthService {
    session: Arc<AuthSession>,
}

impl TenantAuthService {
    /// Tenant login over `session`
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Tenant-scoped authorize endpoint on the portal origin
    #[must_use]
    pub fn authorize_url(&self) -> String {
        let config = self.session.token_manager().config();
        config.portal_url(&format!("{}{TENANT_AUTHORIZE_PATH}", config.portal_name))
    }

    /// Provider logout chained to the tenant SSO logout page
    #[must_use]
    pub fn logout_url(&self) -> String {
        let config = self.session.token_manager().config();
        format!(
            "{}?redirect={}",
            config.logout_endpoint(),
            urlencoding::encode(TENANT_LOGOUT_PATH)
        )
    }
}

fn is_account_locked(response: &FormResponse) -> bool {
    let mentions_lock = |text: &str| text.to_ascii_lowercase().contains(ACCOUNT_LOCKED_MARKER);
    response.status == FORBIDDEN
        && (mentions_lock(&response.status_text) || mentions_lock(&response.body))
}

#[async_trait]
impl PortalAuthenticator for TenantAuthService {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<UserProfile>, AuthServiceError> {
        let params = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client_id", TENANT_CLIENT_ID),
        ];
        info!(user = %credentials.username, "Logging in to tenant");

        let response = match self.session.http().post_form(&self.authorize_url(), &params).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Tenant login request failed");
                return Err(AuthServiceError::LoginFailure);
            }
        };

        if is_account_locked(&response) {
            warn!(user = %credentials.username, "Tenant account locked");
            return Err(AuthServiceError::AccountLocked);
        }
        if !response.is_success() {
            warn!(status = response.status, "Tenant rejected credentials");
            return Err(AuthServiceError::LoginFailure);
        }

        self.session.login_with_current_cookies().await.map_err(|err| {
            warn!(code = err.code(), "Cookie validation after tenant login failed");
            AuthServiceError::LoginFailure
        })
    }

    async fn logout_with(&self, reason: LogoutReason) -> Result<(), AuthServiceError> {
        let mode = self.session.token_manager().config().logout_mode;
        let result = self.session.http().fetch_logout(&self.logout_url(), mode).await;
        if let Err(err) = &result {
            warn!(error = %err, "Provider logout call failed");
        }

        self.session.end_session(reason);
        result.map(|_| ()).map_err(AuthServiceError::from)
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }
}
