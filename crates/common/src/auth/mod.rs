//! Silent OAuth Token Acquisition
//!
//! This module implements the client side of an implicit-grant single sign-on
//! integration: tokens are obtained without navigating the host page, by
//! loading the authorize URL in a hidden browsing context and receiving the
//! resulting hash fragment from the token-relay page over a message bus.
//!
//! # Features
//!
//! - **Isolated Loading**: hidden contexts with per-attempt timeouts and
//!   landing checks (provider marker, expected location, error marker)
//! - **Message Relay**: one-shot listeners on a host-wide message bus
//! - **CSRF Protection**: per-attempt nonce/state, validated before any
//!   token is accepted
//! - **Background Refresh**: a single timer keyed to the token's lifetime
//! - **Multi-Provider**: nonce validation (UAA) or state validation (Auth0),
//!   string or array scopes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  OAuthService   │  Read-mostly facade
//! └────────┬────────┘
//!          │
//!          └──► TokenManager        (State machine + refresh)
//!                    │
//!                    ├──► IsolatedLoader ──► BrowsingEngine (hidden contexts)
//!                    ├──► MessageBus      (relay of the hash fragment)
//!                    ├──► RefreshSchedule (single background timer)
//!                    └──► CSRF / authorize / scopes / jwt helpers
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use portal_sso_common::auth::{BrowsingEngine, MessageBus, TokenManager};
//! use portal_sso_domain::OAuthConfig;
//!
//! async fn example(engine: Arc<dyn BrowsingEngine>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::new(
//!         "https://idp.example".to_string(),
//!         "portal".to_string(),
//!         "https://portal.example".to_string(),
//!     )
//!     .with_redirect_url("/login-redirect.html");
//!
//!     let manager = TokenManager::new(config, engine, MessageBus::new());
//!
//!     match manager.request_access_token(None).await {
//!         Ok(tokens) => println!("{} authorities granted", tokens.authorities.len()),
//!         Err(e) => match e.redirect() {
//!             Some(url) => println!("Log in at {url}"),
//!             None => return Err(e.into()),
//!         },
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenSet`, `TokenClaims`, `GrantedAuthority`,
//!   `PendingAuthorization`
//! - **[`jwt`]**: claim decoding and expiry checks
//! - **[`csrf`]**: nonce/state generation and verification
//! - **[`authorize`]**: authorize URLs and relayed fragments
//! - **[`scopes`]**: authority filtering and parsing
//! - **[`document`]**: landed page documents
//! - **[`navigation`]**: the isolated navigation loader
//! - **[`channel`]**: the cross-context message bus
//! - **[`refresh`]**: the refresh schedule
//! - **[`token_manager`]**: the token lifecycle state machine
//! - **[`service`]**: the read-mostly facade

pub mod authorize;
pub mod csrf;
pub mod document;
pub mod jwt;
pub mod scopes;
pub mod types;

#[cfg(feature = "runtime")]
pub mod channel;
#[cfg(feature = "runtime")]
pub mod navigation;
#[cfg(feature = "runtime")]
pub mod refresh;
#[cfg(feature = "runtime")]
pub mod service;
#[cfg(feature = "runtime")]
pub mod token_manager;
#[cfg(feature = "runtime")]
pub mod traits;

// Re-export commonly used types and functions
pub use authorize::{AuthorizeResponse, AuthorizeUrls};
pub use csrf::generate_nonce;
pub use document::{HtmlDocument, PageDocument};
pub use jwt::{decode_claims, is_token_expired, JwtError};
pub use scopes::{filter_scope_authorities, parse_authority, ScopeList};
pub use types::{GrantedAuthority, PendingAuthorization, TokenClaims, TokenSet};

#[cfg(feature = "runtime")]
pub use channel::{ChannelError, MessageBus};
#[cfg(feature = "runtime")]
pub use navigation::{IsolatedLoader, LoadError, LoadRequest, LoadedContext};
#[cfg(feature = "runtime")]
pub use refresh::{refresh_delay, RefreshSchedule};
#[cfg(feature = "runtime")]
pub use service::OAuthService;
#[cfg(feature = "runtime")]
pub use token_manager::{TokenEvent, TokenManager, TokenManagerError, TokenPhase};
#[cfg(feature = "runtime")]
pub use traits::{BrowsingEngine, ContextId, NavigationFailure};
