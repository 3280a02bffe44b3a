//! Cookie/CSRF portal login
//!
//! The provider login page embeds a CSRF token. It is read from a hidden
//! context, then sent with the credentials to `/login.do`. A successful POST
//! leaves session cookies that the silent token request picks up.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use portal_sso_common::auth::{LoadRequest, LoadedContext, PageDocument, TokenSet};
use portal_sso_domain::constants::{
    GOOGLE_AUTHORIZE_PREFIX, LOGIN_CSRF_FIELD, LOGIN_PAGE_PATH, LOGIN_SUBMIT_PATH,
    SINGLE_LOGOUT_PATH,
};
use portal_sso_domain::{Credentials, LogoutReason, UserProfile};

use super::{AuthServiceError, PortalAuthenticator};
use crate::session::AuthSession;

/// Outcome of [`UaaAuthService::login_with_google`]
#[derive(Debug, Clone, PartialEq)]
pub enum GoogleLogin {
    /// The provider session was still valid
    AlreadyAuthenticated(TokenSet),
    /// The host page was sent to Google's authorize URL
    Redirected(String),
}

/// Read the login CSRF token from a provider page
#[must_use]
pub fn extract_csrf_token(document: &dyn PageDocument) -> Option<String> {
    document.input_value(LOGIN_CSRF_FIELD).filter(|token| !token.is_empty())
}

/// Portal login against a UAA-style provider
#[derive(Debug)]
pub struct UaaAuthService {
    session: Arc<AuthSession>,
}

impl UaaAuthService {
    /// Cookie/CSRF login over `session`
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Log in through Google when no provider session exists
    ///
    /// A still-valid session short-circuits with its token. Otherwise the
    /// login page's Google link is followed at the top level.
    ///
    /// # Errors
    /// Returns [`AuthServiceError::Page`] when the login page cannot be
    /// loaded (e.g. already logged in elsewhere) and
    /// [`AuthServiceError::MissingPageElement`] when it has no Google link.
    pub async fn login_with_google(&self) -> Result<GoogleLogin, AuthServiceError> {
        match self.session.test_for_oauth_token().await {
            Ok(tokens) => return Ok(GoogleLogin::AlreadyAuthenticated(tokens)),
            Err(err) => debug!(code = err.code(), "No provider session; following Google login link"),
        }

        let context = self.load_login_page().await?;
        let link = context.document().link_with_prefix(GOOGLE_AUTHORIZE_PREFIX);
        context.release();

        let link = link.ok_or(AuthServiceError::MissingPageElement("Google login link"))?;
        self.session.navigator().navigate_top(&link);
        info!("Redirected to Google login");
        Ok(GoogleLogin::Redirected(link))
    }

    async fn load_login_page(&self) -> Result<LoadedContext, AuthServiceError> {
        let manager = self.session.token_manager();
        let request = LoadRequest::new(manager.config().portal_url(LOGIN_PAGE_PATH))
            .expecting(LOGIN_PAGE_PATH);
        manager.loader().load(request).await.map_err(AuthServiceError::Page)
    }

    async fn fetch_csrf_token(&self) -> Result<String, AuthServiceError> {
        let context = self.load_login_page().await?;
        let token = extract_csrf_token(context.document());
        context.release();
        token.ok_or(AuthServiceError::MissingPageElement("login CSRF token"))
    }

    async fn submit_credentials(
        &self,
        credentials: &Credentials,
        csrf_token: &str,
    ) -> Result<(), AuthServiceError> {
        let url = self.session.token_manager().config().portal_url(LOGIN_SUBMIT_PATH);
        let params = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            (LOGIN_CSRF_FIELD, csrf_token),
        ];
        let response = self.session.http().post_form(&url, &params).await?;

        match response.query_param("error") {
            Some(marker) => {
                warn!(error = %marker, "Provider rejected credentials");
                Err(AuthServiceError::Rejected(marker))
            }
            None => Ok(()),
        }
    }

    /// Tell the backend to drop every token of this user, without waiting
    fn spawn_single_logout(&self) {
        let Some(tokens) = self.session.token_manager().current_tokens() else {
            debug!("No token held; skipping single logout");
            return;
        };
        let transport = Arc::clone(self.session.transport());

        tokio::spawn(async move {
            let result = transport
                .send(SINGLE_LOGOUT_PATH, "logout", Value::Null, Some(&tokens.access_token))
                .await;
            if let Err(err) = result {
                warn!(error = %err, "Single logout failed");
            }
        });
    }
}

#[async_trait]
impl PortalAuthenticator for UaaAuthService {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<UserProfile>, AuthServiceError> {
        info!(user = %credentials.username, "Logging in with credentials");
        let csrf_token = self.fetch_csrf_token().await?;
        self.submit_credentials(credentials, &csrf_token).await?;
        self.session.login_with_current_cookies().await
    }

    async fn logout_with(&self, reason: LogoutReason) -> Result<(), AuthServiceError> {
        self.spawn_single_logout();

        let config = self.session.token_manager().config();
        let result = self
            .session
            .http()
            .fetch_logout(&config.logout_endpoint(), config.logout_mode)
            .await;
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
