//! # Portal SSO Core
//!
//! Login orchestration layer - no HTTP or browser code.
//!
//! This crate contains:
//! - Port interfaces for HTTP, the backend transport and host navigation
//! - Session state-change publishing and the shared [`AuthSession`]
//! - Portal login variants (cookie/CSRF and multi-tenant)
//! - Account self-service and the inactivity timer
//!
//! ## Architecture Principles
//! - Only depends on `portal-sso-common` and `portal-sso-domain`
//! - All external effects via traits in [`ports`]
//! - Token acquisition is delegated to the common `TokenManager`

pub mod account;
pub mod idle;
pub mod login;
pub mod ports;
pub mod session;

// Re-export specific items to avoid ambiguity
pub use account::AccountService;
pub use idle::{InactivityHandle, InactivityTimer, LogoutWarning};
pub use login::{
    spawn_refresh_failure_logout, AuthServiceError, GoogleLogin, PortalAuthenticator,
    TenantAuthService, UaaAuthService,
};
pub use ports::{BackendTransport, FormResponse, HostNavigator, SsoHttpClient, TransportError};
pub use session::{AuthSession, SessionEvents, Subscription};
