//! Protocol constants
//!
//! Well-known names and paths shared by the identity provider pages, the
//! token-relay page and the portal.

// Token relay
/// Message channel used exclusively by the token-relay page.
pub const LOGIN_REDIRECT_CHANNEL: &str = "login-redirect-data";
/// Page the identity provider redirects to when the user is logged in.
pub const TOKEN_RELAY_PAGE: &str = "login-redirect.html";

// Timing
/// Hidden-context load timeout.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;
/// Relay message timeout.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 10_000;
/// Refresh this many seconds before the token window closes.
pub const DEFAULT_REFRESH_OFFSET_SECS: u64 = 100;
/// Idle time before the logout warning.
pub const DEFAULT_INACTIVITY_INTERVAL_MINS: u64 = 5;
/// Time the warning stays up before logout.
pub const DEFAULT_LOGOUT_CONFIRMATION_INTERVAL_MINS: u64 = 1;

// CSRF
/// Characters in a generated nonce.
pub const NONCE_LENGTH: usize = 16;
/// Characters a nonce is drawn from.
pub const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// Authorities
/// Scope prefix of the portal's own authorities.
pub const DEFAULT_AUTHORITY_NAMESPACE: &str = "guidewire.edge";

/// `<meta content=...>` values identifying the provider's own page family.
pub const PROVIDER_PAGE_MARKERS: [&str; 2] = ["Cloud Foundry", "Guidewire"];
/// Substring of a landed URL that marks a provider-side failure.
pub const LANDED_URL_ERROR_MARKER: &str = "error";

// Cookie/CSRF login
/// Provider login page, on the portal origin.
pub const LOGIN_PAGE_PATH: &str = "/login";
/// Credential form target.
pub const LOGIN_SUBMIT_PATH: &str = "/login.do";
/// Name of the hidden CSRF input on the login page.
pub const LOGIN_CSRF_FIELD: &str = "X-Uaa-Csrf";
/// Link prefix of the delegated Google login.
pub const GOOGLE_AUTHORIZE_PREFIX: &str = "https://accounts.google.com/o/oauth2";
/// Backend session-termination endpoint.
pub const SINGLE_LOGOUT_PATH: &str = "/singlelogout";

// Multi-tenant login
/// Tenant-scoped credential endpoint, after the portal name.
pub const TENANT_AUTHORIZE_PATH: &str = "/sso/oauth/authorize";
/// Tenant logout page the provider logout chains to.
pub const TENANT_LOGOUT_PATH: &str = "/sso/logout";
/// Client id sent with tenant credentials.
pub const TENANT_CLIENT_ID: &str = "uaa";
/// Lower-case text marking a locked-account `403`.
pub const ACCOUNT_LOCKED_MARKER: &str = "locked";

// Account self-service
/// Backend path for password reset calls.
pub const RESET_PASSWORD_PATH: &str = "/resetpassword";
/// Backend path for sign-up calls.
pub const SIGNUP_PATH: &str = "/signup";
/// Page carrying a reset code in its form.
pub const RESET_CODE_PAGE_PATH: &str = "/reset_password";
/// Input holding the reset code.
pub const RESET_CODE_FIELD: &str = "code";
/// Client route appended to the reset page URL.
pub const RESET_PASSWORD_ROUTE: &str = "#/auth/resetpassword";
