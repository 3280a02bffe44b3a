//! OAuth token manager
//!
//! Drives the implicit-grant round-trip for one identity-provider
//! configuration:
//!
//! ```text
//! Idle ─► AuthorizationRequested ─► Loading ∥ AwaitingMessage ─► TokenValidated
//!                                                                    │
//!            ┌───────────────────────── Valid ◄──────────────────────┘
//!            ▼
//!     RefreshScheduled ─► Refreshing ─► Valid
//!                              └──────► RefreshFailed ─► LoggedOut
//! ```
//!
//! A token request joins two waits: the hidden context loading the authorize
//! URL, and the relay message carrying the hash fragment. Both must succeed;
//! the first failure wins and the other branch is dropped before it can touch
//! shared state. Overlapping requests queue behind each other, each with a
//! fresh nonce/state.

use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use portal_sso_domain::constants::{LOGIN_REDIRECT_CHANNEL, TOKEN_RELAY_PAGE};
use portal_sso_domain::OAuthConfig;

use super::authorize::{AuthorizeResponse, AuthorizeUrls};
use super::channel::{ChannelError, MessageBus};
use super::jwt::{self, JwtError};
use super::navigation::{IsolatedLoader, LoadError, LoadRequest, LoadedContext};
use super::refresh::{refresh_delay, RefreshSchedule};
use super::scopes::{filter_scope_authorities, ScopeList};
use super::traits::BrowsingEngine;
use super::types::{PendingAuthorization, TokenSet};
use crate::error::{ErrorClassification, ErrorSeverity};

const EVENT_CAPACITY: usize = 16;

/// Error type for token manager operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenManagerError {
    /// The user has no provider session. When `redirect` is set the caller
    /// should navigate the top-level page there to log in interactively.
    #[error("Not logged in")]
    NotLoggedIn { redirect: Option<String> },

    /// The hidden context failed for a reason other than "not logged in"
    #[error("Login check failed: {0}")]
    Load(LoadError),

    /// The relay message never arrived or was unreadable
    #[error("Login check failed: {0}")]
    Message(ChannelError),

    /// The echoed nonce/state does not match the pending authorization
    #[error("{parameter} value of token does not match the value used in request")]
    CsrfMismatch { parameter: &'static str },

    /// The provider returned neither an access token nor any authority
    #[error("Expecting to set an access token or authorities or both")]
    TokenMissing,

    /// The access token claims could not be decoded
    #[error("Invalid access token: {0}")]
    InvalidToken(#[from] JwtError),

    /// The tokens were removed while this request was in flight
    #[error("Session ended before the token request completed")]
    SessionEnded,
}

impl TokenManagerError {
    /// Stable code for callers reacting to classified failures
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotLoggedIn { .. } | Self::SessionEnded => "notLoggedIn",
            Self::Load(_)
            | Self::Message(_)
            | Self::CsrfMismatch { .. }
            | Self::TokenMissing
            | Self::InvalidToken(_) => "checkIfLoggedInError",
        }
    }

    /// Top-level redirect the caller should perform, if any
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::NotLoggedIn { redirect } => redirect.as_deref(),
            _ => None,
        }
    }
}

impl ErrorClassification for TokenManagerError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Load(e) => e.is_retryable(),
            Self::Message(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotLoggedIn { .. } | Self::SessionEnded => ErrorSeverity::Info,
            Self::Load(e) => e.severity(),
            Self::Message(e) => e.severity(),
            Self::CsrfMismatch { .. } => ErrorSeverity::Critical,
            Self::TokenMissing | Self::InvalidToken(_) => ErrorSeverity::Error,
        }
    }
}

/// Phase of the token lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPhase {
    /// No token and no request in flight
    Idle,
    /// Nonce/state generated and authorize URL built
    AuthorizationRequested,
    /// Loader and relay listener both in flight
    Loading,
    /// Echoed nonce/state checked
    TokenValidated,
    /// A token is stored
    Valid,
    /// A token is stored and its refresh timer is armed
    RefreshScheduled,
    /// The refresh timer fired and a new request is in flight
    Refreshing,
    /// The background refresh failed; logout follows
    RefreshFailed,
    /// Tokens removed after a failed refresh
    LoggedOut,
    /// The provider has no session for the user
    NotLoggedIn,
    /// A top-level redirect to the provider is needed
    ExternalRedirectRequired,
}

impl fmt::Display for TokenPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle notifications published by the manager
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    /// A request stored a new token set
    TokensSet(TokenSet),
    /// The token set was removed; `origin` names the issuing provider
    TokensRemoved { origin: Option<String> },
    /// A background refresh failed; the session should be logged out
    RefreshFailed(TokenManagerError),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenSlot {
    Pending,
    Ready(TokenSet),
    Rejected,
}

struct SessionState {
    pending: Option<PendingAuthorization>,
    phase: TokenPhase,
    /// Bumped by every removal; requests started under an older value are stale
    session: u64,
}

struct Inner {
    config: OAuthConfig,
    loader: IsolatedLoader,
    bus: MessageBus,
    state: Mutex<SessionState>,
    tokens: watch::Sender<TokenSlot>,
    events: broadcast::Sender<TokenEvent>,
    refresh: Arc<RefreshSchedule>,
    acquisition: tokio::sync::Mutex<()>,
}

/// Owns the current token set, the pending nonce/state and the refresh timer
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("client_id", &self.inner.config.client_id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager for `config`
    ///
    /// `engine` hosts the hidden contexts; `bus` is the host message bus the
    /// token-relay page posts to.
    #[must_use]
    pub fn new(config: OAuthConfig, engine: Arc<dyn BrowsingEngine>, bus: MessageBus) -> Self {
        let loader = IsolatedLoader::new(engine, config.timeouts.load_timeout());
        let (tokens, _) = watch::channel(TokenSlot::Pending);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                config,
                loader,
                bus,
                state: Mutex::new(SessionState {
                    pending: None,
                    phase: TokenPhase::Idle,
                    session: 0,
                }),
                tokens,
                events,
                refresh: RefreshSchedule::new(),
                acquisition: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Configuration this manager was built from
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.inner.config
    }

    /// Host message bus the relay page posts to
    #[must_use]
    pub fn message_bus(&self) -> &MessageBus {
        &self.inner.bus
    }

    /// Loader for hidden contexts
    #[must_use]
    pub fn loader(&self) -> &IsolatedLoader {
        &self.inner.loader
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> TokenPhase {
        self.inner.state.lock().phase
    }

    /// Subscribe to lifecycle events
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<TokenEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a background refresh is armed
    #[must_use]
    pub fn is_refresh_scheduled(&self) -> bool {
        self.inner.refresh.is_armed()
    }

    /// Current token set, without waiting
    #[must_use]
    pub fn current_tokens(&self) -> Option<TokenSet> {
        match &*self.inner.tokens.borrow() {
            TokenSlot::Ready(tokens) => Some(tokens.clone()),
            TokenSlot::Pending | TokenSlot::Rejected => None,
        }
    }

    /// Obtain a token through the hidden authorize round-trip
    ///
    /// `state` is round-tripped through the provider; it defaults to the
    /// configured refresh redirect page. On success the token is stored and
    /// a background refresh is armed from its `iat`/`exp` claims.
    ///
    /// # Errors
    /// - [`TokenManagerError::NotLoggedIn`] when the provider has no session
    ///   for the user, carrying the interactive authorize URL when a
    ///   top-level redirect is needed
    /// - [`TokenManagerError::CsrfMismatch`] when the echoed nonce/state is
    ///   wrong
    /// - [`TokenManagerError::TokenMissing`] when nothing was granted
    /// - [`TokenManagerError::Load`] / [`TokenManagerError::Message`] for
    ///   other loader or relay failures
    /// - [`TokenManagerError::SessionEnded`] when the tokens were removed
    ///   after this call was made
    pub fn request_access_token(
        &self,
        state: Option<String>,
    ) -> BoxFuture<'static, Result<TokenSet, TokenManagerError>> {
        let inner = Arc::clone(&self.inner);
        let caller_state = state.or_else(|| inner.config.refresh_redirect_page.clone());
        let session = inner.state.lock().session;
        Box::pin(async move { inner.acquire(caller_state, session).await })
    }

    /// Drop the current tokens and disarm the refresh timer
    ///
    /// Waiters registered from now on block until the next successful
    /// request. Returns the `origin` claim of the removed token.
    pub fn remove_tokens(&self) -> Option<String> {
        self.inner.remove_tokens()
    }

    /// Wait until a token set exists
    ///
    /// Resolves immediately when one is already stored.
    ///
    /// # Errors
    /// Returns [`TokenManagerError::TokenMissing`] when the most recent
    /// request was rejected for granting nothing.
    pub async fn wait_tokens_set(&self) -> Result<TokenSet, TokenManagerError> {
        let mut receiver = self.inner.tokens.subscribe();
        let slot = receiver
            .wait_for(|slot| !matches!(slot, TokenSlot::Pending))
            .await
            .map_err(|_| TokenManagerError::TokenMissing)?;

        match &*slot {
            TokenSlot::Ready(tokens) => Ok(tokens.clone()),
            TokenSlot::Pending | TokenSlot::Rejected => Err(TokenManagerError::TokenMissing),
        }
    }

    /// Keep only the scopes under the configured authority namespace
    pub fn filter_scope_authorities(&self, scopes: impl Into<ScopeList>) -> Vec<String> {
        filter_scope_authorities(scopes, &self.inner.config.authority_namespace)
    }
}

impl Inner {
    fn set_phase(&self, phase: TokenPhase) {
        let mut state = self.state.lock();
        if state.phase != phase {
            debug!(token_phase = %phase, previous = %state.phase, "Token phase transition");
            state.phase = phase;
        }
    }

    async fn acquire(
        self: Arc<Self>,
        caller_state: Option<String>,
        session: u64,
    ) -> Result<TokenSet, TokenManagerError> {
        let _turn = self.acquisition.lock().await;

        let pending = PendingAuthorization::generate(caller_state.as_deref());
        let urls = AuthorizeUrls::build(&self.config, &pending);
        {
            let mut state = self.state.lock();
            if state.session != session {
                debug!("Token request dropped; session ended while it was queued");
                return Err(TokenManagerError::SessionEnded);
            }
            state.pending = Some(pending.clone());
        }
        self.set_phase(TokenPhase::AuthorizationRequested);
        info!(silent = urls.silent.is_some(), "Requesting access token");

        let request = LoadRequest::new(urls.navigate_url())
            .expecting(TOKEN_RELAY_PAGE)
            .with_failure_redirect(urls.failure_redirect_url());

        // Subscribe before navigating so the relay cannot outrun the listener.
        let relay = self
            .bus
            .wait_for_message(LOGIN_REDIRECT_CHANNEL, self.config.timeouts.message_timeout());
        self.set_phase(TokenPhase::Loading);

        let load = async {
            match self.loader.load(request).await {
                Ok(context) => Ok(ReleaseOnDrop(context)),
                Err(err) => Err(translate_load_error(err, &urls)),
            }
        };
        let relay = async { relay.await.map_err(TokenManagerError::Message) };

        let joined = tokio::try_join!(load, relay);
        if self.state.lock().session != session {
            debug!("Token request abandoned; session ended while it was in flight");
            return Err(TokenManagerError::SessionEnded);
        }
        let (context, payload) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                self.set_phase(match &err {
                    TokenManagerError::NotLoggedIn { redirect: Some(_) } => {
                        TokenPhase::ExternalRedirectRequired
                    }
                    TokenManagerError::NotLoggedIn { redirect: None } => TokenPhase::NotLoggedIn,
                    _ => TokenPhase::Idle,
                });
                warn!(code = err.code(), error = %err, "Access token request failed");
                return Err(err);
            }
        };
        drop(context);

        let tokens = self.accept(&payload, &pending, session)?;
        self.schedule_refresh(&tokens, caller_state, session);
        Ok(tokens)
    }

    fn accept(
        &self,
        payload: &Value,
        pending: &PendingAuthorization,
        session: u64,
    ) -> Result<TokenSet, TokenManagerError> {
        let fragment = payload.as_str().ok_or_else(|| {
            TokenManagerError::Message(ChannelError::InvalidPayload(
                LOGIN_REDIRECT_CHANNEL.to_string(),
            ))
        })?;
        let response = AuthorizeResponse::from_fragment(fragment);
        let mode = self.config.validate;

        let access_token = response.access_token.clone().unwrap_or_default();
        let authorities = filter_scope_authorities(
            response.scope.clone().unwrap_or_default(),
            &self.config.authority_namespace,
        );
        let claims = match jwt::decode_claims(&access_token) {
            Ok(claims) => Some(claims),
            Err(err) => {
                debug!(error = %err, "Access token is not a decodable JWT");
                None
            }
        };

        // Verification and storage happen under one lock so a concurrent
        // removal either precedes both or follows both.
        let mut state = self.state.lock();
        if state.session != session {
            debug!("Authorize response discarded; session ended while it was in flight");
            return Err(TokenManagerError::SessionEnded);
        }
        let verified = if state.pending.as_ref() == Some(pending) {
            pending.verify(mode, response.echoed(mode))
        } else {
            pending.verify(mode, None)
        };
        if let Err(parameter) = verified {
            state.phase = TokenPhase::Idle;
            drop(state);
            warn!(parameter, "Rejected authorize response with mismatching CSRF value");
            return Err(TokenManagerError::CsrfMismatch { parameter });
        }

        if access_token.is_empty() && authorities.is_empty() {
            self.tokens.send_replace(TokenSlot::Rejected);
            state.phase = TokenPhase::Idle;
            drop(state);
            warn!("Authorize response carried neither a token nor authorities");
            return Err(TokenManagerError::TokenMissing);
        }

        let tokens = TokenSet::new(access_token, authorities, claims);
        self.tokens.send_replace(TokenSlot::Ready(tokens.clone()));
        state.phase = TokenPhase::Valid;
        drop(state);

        let _ = self.events.send(TokenEvent::TokensSet(tokens.clone()));
        info!(authorities = tokens.authorities.len(), "Access token set");
        Ok(tokens)
    }

    fn schedule_refresh(
        self: &Arc<Self>,
        tokens: &TokenSet,
        caller_state: Option<String>,
        session: u64,
    ) {
        let delay = tokens
            .claims
            .as_ref()
            .and_then(|claims| refresh_delay(claims, self.config.timeouts.refresh_offset()));
        let Some(delay) = delay else {
            self.refresh.cancel();
            debug!("Token carries no iat/exp; refresh not scheduled");
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_fire: BoxFuture<'static, ()> = Box::pin(async move {
            let Some(inner) = weak.upgrade() else { return };
            if inner.state.lock().session != session {
                return;
            }
            inner.set_phase(TokenPhase::Refreshing);
            info!("Refreshing access token");

            // Runs under the session the token was stored in; a removal
            // since then turns the refresh into a no-op.
            match Arc::clone(&inner).acquire(caller_state, session).await {
                Ok(_) => {}
                Err(TokenManagerError::SessionEnded) => {
                    debug!("Background token refresh abandoned; session already ended");
                }
                Err(err) => {
                    inner.set_phase(TokenPhase::RefreshFailed);
                    warn!(code = err.code(), error = %err, "Background token refresh failed");
                    let _ = inner.events.send(TokenEvent::RefreshFailed(err));
                }
            }
        });

        let mut state = self.state.lock();
        if state.session != session {
            return;
        }
        self.refresh.arm(delay, on_fire);
        state.phase = TokenPhase::RefreshScheduled;
    }

    fn remove_tokens(&self) -> Option<String> {
        self.refresh.cancel();
        let origin = {
            let mut state = self.state.lock();
            let previous = self.tokens.send_replace(TokenSlot::Pending);
            state.session += 1;
            state.pending = None;
            state.phase = if state.phase == TokenPhase::RefreshFailed {
                TokenPhase::LoggedOut
            } else {
                TokenPhase::Idle
            };
            match previous {
                TokenSlot::Ready(tokens) => tokens.origin().map(str::to_string),
                TokenSlot::Pending | TokenSlot::Rejected => None,
            }
        };

        let _ = self.events.send(TokenEvent::TokensRemoved { origin: origin.clone() });
        info!(origin = origin.as_deref().unwrap_or("unknown"), "Tokens removed");
        origin
    }
}

/// Releases a landed context however the join ends
struct ReleaseOnDrop(LoadedContext);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Map a loader failure to the manager-level error
///
/// Any "log in elsewhere" signal redirects to the interactive authorize URL,
/// never to the page the hidden context happened to land on.
fn translate_load_error(err: LoadError, urls: &AuthorizeUrls) -> TokenManagerError {
    match err {
        LoadError::ExternalRedirectRequired(_) | LoadError::CrossOrigin => {
            TokenManagerError::NotLoggedIn { redirect: Some(urls.plain.clone()) }
        }
        LoadError::UnexpectedLocation { .. } => TokenManagerError::NotLoggedIn { redirect: None },
        other => TokenManagerError::Load(other),
    }
}
