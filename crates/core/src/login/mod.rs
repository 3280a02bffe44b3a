//! Portal login variants
//!
//! Every variant drives the shared [`AuthSession`] and the common token
//! manager; they differ in how credentials reach the provider:
//!
//! - [`UaaAuthService`]: CSRF token scraped from the provider login page,
//!   credentials POSTed to `/login.do`, delegated Google login
//! - [`TenantAuthService`]: credentials POSTed to a tenant-scoped authorize
//!   endpoint, account-lock detection

mod tenant;
mod uaa;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use portal_sso_common::auth::{LoadError, TokenEvent, TokenManagerError};
use portal_sso_common::{ErrorClassification, ErrorSeverity};
use portal_sso_domain::{Credentials, LogoutReason, SsoError, UserProfile};

use crate::ports::TransportError;
use crate::session::AuthSession;

pub use tenant::TenantAuthService;
pub use uaa::{extract_csrf_token, GoogleLogin, UaaAuthService};

/// Error type for login, logout and account operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthServiceError {
    #[error(transparent)]
    Token(#[from] TokenManagerError),

    #[error("Login failed")]
    LoginFailure,

    #[error("Account locked")]
    AccountLocked,

    /// Error marker returned by the provider in the login redirect URL
    #[error("Login rejected: {0}")]
    Rejected(String),

    #[error("Email not found")]
    EmailNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid reset code or email")]
    InvalidTokenOrEmail,

    /// The session ended before a pending login completed
    #[error("Logged out")]
    LoggedOut,

    #[error("Provider page unavailable: {0}")]
    Page(LoadError),

    #[error("Provider page has no {0}")]
    MissingPageElement(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Http(#[from] SsoError),
}

impl AuthServiceError {
    /// Stable code for callers reacting to classified failures
    ///
    /// Provider-supplied error markers are returned verbatim.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Token(err) => err.code(),
            Self::LoginFailure => "login_failure",
            Self::AccountLocked => "account_locked",
            Self::Rejected(marker) => marker,
            Self::EmailNotFound => "emailNotFound",
            Self::UserAlreadyExists => "userAlreadyExists",
            Self::InvalidTokenOrEmail => "checkIfLoggedInError",
            Self::LoggedOut => "notLoggedIn",
            Self::Page(err) => err.code(),
            Self::MissingPageElement(_) => "pageElementMissing",
            Self::Transport(_) => "transportError",
            Self::Http(_) => "networkError",
        }
    }
}

impl ErrorClassification for AuthServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Token(err) => err.is_retryable(),
            Self::Page(err) => err.is_retryable(),
            Self::Http(SsoError::Network(_)) => true,
            Self::Transport(err) => err.status_code().is_some_and(|status| status >= 500),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Token(err) => err.severity(),
            Self::LoggedOut => ErrorSeverity::Info,
            Self::LoginFailure
            | Self::AccountLocked
            | Self::Rejected(_)
            | Self::EmailNotFound
            | Self::UserAlreadyExists
            | Self::InvalidTokenOrEmail => ErrorSeverity::Warning,
            Self::Page(_) | Self::MissingPageElement(_) | Self::Transport(_) | Self::Http(_) => {
                ErrorSeverity::Error
            }
        }
    }
}

/// One portal's login/logout contract
#[async_trait]
pub trait PortalAuthenticator: Send + Sync {
    /// Log in with `credentials`
    ///
    /// Returns `None` when the flow handed off to a top-level redirect.
    async fn login(&self, credentials: &Credentials)
        -> Result<Option<UserProfile>, AuthServiceError>;

    /// Log out, recording `reason` in the emitted session event
    ///
    /// Local tokens are removed and the logout event is emitted whatever the
    /// provider answers.
    async fn logout_with(&self, reason: LogoutReason) -> Result<(), AuthServiceError>;

    /// Log out at the user's request
    async fn logout(&self) -> Result<(), AuthServiceError> {
        self.logout_with(LogoutReason::UserRequested).await
    }

    fn session(&self) -> &AuthSession;
}

/// Log out whenever a background token refresh fails
///
/// The task ends once the authenticator is dropped.
pub fn spawn_refresh_failure_logout(authenticator: &Arc<dyn PortalAuthenticator>) -> JoinHandle<()> {
    let mut events = authenticator.session().token_manager().subscribe_events();
    let authenticator: Weak<dyn PortalAuthenticator> = Arc::downgrade(authenticator);

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TokenEvent::RefreshFailed(err)) => {
                    let Some(authenticator) = authenticator.upgrade() else { break };
                    info!(code = err.code(), "Token refresh failed; logging out");
                    if let Err(err) = authenticator.logout_with(LogoutReason::RefreshFailed).await {
                        warn!(code = err.code(), error = %err, "Logout after refresh failure failed");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Refresh failure watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
            if authenticator.strong_count() == 0 {
                break;
            }
        }
    })
}
