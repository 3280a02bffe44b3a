//! Shared authentication session
//!
//! Owns the pieces every portal variant needs once credentials have been
//! accepted: turning the provider session cookies into a token, fetching the
//! user profile, publishing login/logout transitions and exposing the outcome
//! of the most recent login.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use portal_sso_common::auth::{TokenManager, TokenManagerError, TokenSet};
use portal_sso_domain::{LogoutReason, LogoutTrigger, SessionEvent, UserProfile};

use super::events::{SessionEvents, Subscription};
use crate::account::AccountService;
use crate::login::AuthServiceError;
use crate::ports::{BackendTransport, HostNavigator, SsoHttpClient};

#[derive(Debug, Clone)]
enum LoginOutcome {
    Pending,
    Completed(UserProfile),
    Failed(AuthServiceError),
}

/// Token, profile and session-event plumbing shared by the login variants
pub struct AuthSession {
    manager: TokenManager,
    http: Arc<dyn SsoHttpClient>,
    transport: Arc<dyn BackendTransport>,
    navigator: Arc<dyn HostNavigator>,
    events: SessionEvents,
    account: AccountService,
    outcome: watch::Sender<LoginOutcome>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("manager", &self.manager)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    pub fn new(
        manager: TokenManager,
        http: Arc<dyn SsoHttpClient>,
        transport: Arc<dyn BackendTransport>,
        navigator: Arc<dyn HostNavigator>,
    ) -> Self {
        let account = AccountService::new(Arc::clone(&transport), manager.clone());
        let (outcome, _) = watch::channel(LoginOutcome::Pending);
        Self {
            manager,
            http,
            transport,
            navigator,
            events: SessionEvents::new(),
            account,
            outcome,
        }
    }

    /// Token manager for this session
    #[must_use]
    pub fn token_manager(&self) -> &TokenManager {
        &self.manager
    }

    /// HTTP port
    #[must_use]
    pub fn http(&self) -> &Arc<dyn SsoHttpClient> {
        &self.http
    }

    /// Backend transport port
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn BackendTransport> {
        &self.transport
    }

    /// Host page navigation port
    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn HostNavigator> {
        &self.navigator
    }

    /// Password reset and sign-up
    #[must_use]
    pub fn account(&self) -> &AccountService {
        &self.account
    }

    /// Session event publisher
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Attempt a silent token acquisition with the current provider cookies
    ///
    /// # Errors
    /// Propagates the token manager's classified error.
    pub async fn test_for_oauth_token(&self) -> Result<TokenSet, TokenManagerError> {
        self.manager.request_access_token(None).await
    }

    /// Fetch the user profile with the current token
    ///
    /// Waits for a token first. `user_name` falls back to `name` for
    /// providers that only send the latter.
    ///
    /// # Errors
    /// Returns [`AuthServiceError::Token`] when no token can be obtained and
    /// [`AuthServiceError::Http`] when the user-info call fails.
    pub async fn user_info(&self) -> Result<UserProfile, AuthServiceError> {
        let tokens = self.manager.wait_tokens_set().await?;
        let endpoint = self.manager.config().userinfo_endpoint();
        let profile = self.http.get_user_info(&endpoint, &tokens.access_token).await?;
        Ok(profile.normalized())
    }

    /// Complete a login from the provider session cookies
    ///
    /// Requests a token, fetches the profile and emits the login event. When
    /// the provider requires an interactive login the host page is sent to
    /// the returned redirect and `Ok(None)` is returned.
    ///
    /// # Errors
    /// Returns [`AuthServiceError::LoggedOut`] when a logout ends the session
    /// mid-attempt. Any other failure is returned and also settles
    /// [`wait_for_login_request_complete`](Self::wait_for_login_request_complete).
    pub async fn login_with_current_cookies(&self) -> Result<Option<UserProfile>, AuthServiceError> {
        self.outcome.send_replace(LoginOutcome::Pending);

        let attempt = match self.test_for_oauth_token().await {
            Ok(_) => self.user_info().await,
            Err(err) => Err(err.into()),
        };

        match attempt {
            Ok(profile) => {
                self.emit_login_event(profile.clone());
                self.outcome.send_replace(LoginOutcome::Completed(profile.clone()));
                Ok(Some(profile))
            }
            Err(AuthServiceError::Token(TokenManagerError::NotLoggedIn { redirect: Some(url) })) => {
                info!("Interactive login required; leaving the page");
                self.navigator.navigate_top(&url);
                Ok(None)
            }
            Err(AuthServiceError::Token(TokenManagerError::SessionEnded)) => {
                // The logout that ended the session already settled the outcome.
                info!("Login with current cookies abandoned by logout");
                Err(AuthServiceError::LoggedOut)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Login with current cookies failed");
                self.outcome.send_replace(LoginOutcome::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Publish a login transition for `user`
    pub fn emit_login_event(&self, user: UserProfile) {
        let event = SessionEvent::logged_in(user);
        info!("User logged in");
        self.events.publish(&event);
    }

    /// Publish a logout transition
    ///
    /// Also settles the login outcome as [`AuthServiceError::LoggedOut`], so
    /// later waiters do not see the ended session.
    pub fn emit_logout_event(&self, trigger: Option<LogoutTrigger>) {
        self.outcome.send_replace(LoginOutcome::Failed(AuthServiceError::LoggedOut));
        info!(
            reason = trigger.as_ref().map_or_else(String::new, |t| t.reason.to_string()),
            origin = trigger.as_ref().and_then(|t| t.origin.as_deref()).unwrap_or(""),
            "User logged out"
        );
        self.events.publish(&SessionEvent::logged_out(trigger));
    }

    /// Remove local tokens and emit the logout event for `reason`
    ///
    /// Returns the `origin` claim of the removed token.
    pub fn end_session(&self, reason: LogoutReason) -> Option<String> {
        let origin = self.manager.remove_tokens();
        self.emit_logout_event(Some(LogoutTrigger::new(reason, origin.clone())));
        origin
    }

    /// Outcome of the most recent login attempt
    ///
    /// Waits while a login is in flight or none has started yet.
    ///
    /// # Errors
    /// Returns the failure of the most recent attempt, or
    /// [`AuthServiceError::LoggedOut`] after a logout.
    pub async fn wait_for_login_request_complete(&self) -> Result<UserProfile, AuthServiceError> {
        let mut receiver = self.outcome.subscribe();
        let outcome = receiver
            .wait_for(|outcome| !matches!(outcome, LoginOutcome::Pending))
            .await
            .map_err(|_| AuthServiceError::LoggedOut)?;

        match &*outcome {
            LoginOutcome::Completed(profile) => Ok(profile.clone()),
            LoginOutcome::Failed(err) => Err(err.clone()),
            LoginOutcome::Pending => Err(AuthServiceError::LoggedOut),
        }
    }

    /// Register a listener for login/logout transitions
    pub fn on_login_state_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        debug!("Registering login state listener");
        self.events.subscribe(listener)
    }
}
