//! Configuration structures
//!
//! `OAuthConfig` is immutable once a token manager has been built from it.
//! Everything derives serde so the infra loader can read it from TOML, JSON
//! or environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTHORITY_NAMESPACE, DEFAULT_INACTIVITY_INTERVAL_MINS, DEFAULT_LOAD_TIMEOUT_MS,
    DEFAULT_LOGOUT_CONFIRMATION_INTERVAL_MINS, DEFAULT_MESSAGE_TIMEOUT_MS,
    DEFAULT_REFRESH_OFFSET_SECS,
};
use crate::errors::{Result, SsoError};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Identity provider and portal settings
    pub oauth: OAuthConfig,
    /// Tracing settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Inactivity logout settings
    #[serde(default)]
    pub idle: IdleConfig,
}

/// Which echoed parameter proves the authorize response belongs to us
///
/// UAA echoes the `nonce`; Auth0 echoes the `state`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrfValidation {
    /// Verify the echoed `nonce`
    #[default]
    Nonce,
    /// Verify the echoed `state`
    State,
}

/// Transport mode for the provider logout request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoutMode {
    /// Inspect the response and fail on error statuses
    Cors,
    /// Fire the request and treat any answer as success
    #[default]
    NoCors,
    /// Same-origin request; the response is inspected
    SameOrigin,
}

impl LogoutMode {
    /// Whether the response of the logout call can be inspected
    #[must_use]
    pub fn is_opaque(self) -> bool {
        matches!(self, Self::NoCors)
    }
}

/// Identity-provider endpoint paths, appended to [`OAuthConfig::url`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Implicit-grant authorize endpoint
    pub authorize: String,
    /// Provider logout endpoint
    pub logout: String,
    /// User profile endpoint
    pub userinfo: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "/oauth/authorize".to_string(),
            logout: "/logout.do".to_string(),
            userinfo: "/userinfo".to_string(),
        }
    }
}

/// Per-attempt timeouts and the refresh offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTimeouts {
    /// Hidden-context load timeout in milliseconds
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Relay message timeout in milliseconds
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Seconds subtracted from the token window when scheduling refresh
    #[serde(default = "default_refresh_offset_secs")]
    pub refresh_offset_secs: u64,
}

impl OAuthTimeouts {
    /// Load timeout as a [`Duration`]
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Message timeout as a [`Duration`]
    #[must_use]
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    /// Refresh offset as a [`Duration`]
    #[must_use]
    pub fn refresh_offset(&self) -> Duration {
        Duration::from_secs(self.refresh_offset_secs)
    }
}

impl Default for OAuthTimeouts {
    fn default() -> Self {
        Self {
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            refresh_offset_secs: DEFAULT_REFRESH_OFFSET_SECS,
        }
    }
}

fn default_load_timeout_ms() -> u64 {
    DEFAULT_LOAD_TIMEOUT_MS
}

fn default_message_timeout_ms() -> u64 {
    DEFAULT_MESSAGE_TIMEOUT_MS
}

fn default_refresh_offset_secs() -> u64 {
    DEFAULT_REFRESH_OFFSET_SECS
}

fn default_authority_namespace() -> String {
    DEFAULT_AUTHORITY_NAMESPACE.to_string()
}

/// OAuth configuration for one identity provider
///
/// Supports UAA (nonce validation) and Auth0 (state validation) style
/// providers. Paths such as `/login` are resolved against `portal_origin`,
/// provider endpoints against `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Identity provider base URL (e.g. "https://idp.example")
    pub url: String,

    /// Provider endpoint paths
    #[serde(default)]
    pub endpoints: Endpoints,

    /// OAuth client ID
    pub client_id: String,

    /// Which echoed value is checked against the request
    #[serde(default)]
    pub validate: CsrfValidation,

    /// Requested scopes, sent space-separated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// OAuth audience (Auth0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Path of the token-relay page on the portal origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// Query fragment (e.g. "prompt=none") requesting frictionless authorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent_login_param: Option<String>,

    /// How the provider logout request is sent
    #[serde(default)]
    pub logout_mode: LogoutMode,

    /// Tenant prefix for multi-tenant portals
    #[serde(default)]
    pub portal_name: String,

    /// Origin of the host page (scheme://host[:port])
    pub portal_origin: String,

    /// Default caller state for token requests, including refreshes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_redirect_page: Option<String>,

    /// Scope prefix kept by the authority filter
    #[serde(default = "default_authority_namespace")]
    pub authority_namespace: String,

    /// Per-attempt timeouts and the refresh offset
    #[serde(default)]
    pub timeouts: OAuthTimeouts,
}

impl OAuthConfig {
    /// Create a configuration with default endpoints and timeouts
    #[must_use]
    pub fn new(url: String, client_id: String, portal_origin: String) -> Self {
        Self {
            url,
            endpoints: Endpoints::default(),
            client_id,
            validate: CsrfValidation::default(),
            scopes: Vec::new(),
            audience: None,
            redirect_url: None,
            silent_login_param: None,
            logout_mode: LogoutMode::default(),
            portal_name: String::new(),
            portal_origin,
            refresh_redirect_page: None,
            authority_namespace: default_authority_namespace(),
            timeouts: OAuthTimeouts::default(),
        }
    }

    /// Set the CSRF validation mode
    #[must_use]
    pub fn with_validation(mut self, validate: CsrfValidation) -> Self {
        self.validate = validate;
        self
    }

    /// Set the requested scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the audience
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the token-relay page path
    #[must_use]
    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    /// Set the silent-login query parameter
    #[must_use]
    pub fn with_silent_login_param(mut self, param: impl Into<String>) -> Self {
        self.silent_login_param = Some(param.into());
        self
    }

    /// Set the tenant prefix
    #[must_use]
    pub fn with_portal_name(mut self, portal_name: impl Into<String>) -> Self {
        self.portal_name = portal_name.into();
        self
    }

    /// Set the logout mode
    #[must_use]
    pub fn with_logout_mode(mut self, mode: LogoutMode) -> Self {
        self.logout_mode = mode;
        self
    }

    /// Set the timeouts
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: OAuthTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Provider authorize endpoint
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!("{}{}", self.url, self.endpoints.authorize)
    }

    /// Provider logout endpoint
    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        format!("{}{}", self.url, self.endpoints.logout)
    }

    /// Provider user-info endpoint
    #[must_use]
    pub fn userinfo_endpoint(&self) -> String {
        format!("{}{}", self.url, self.endpoints.userinfo)
    }

    /// Resolve a same-origin path against the host page origin
    #[must_use]
    pub fn portal_url(&self, path: &str) -> String {
        format!("{}{}", self.portal_origin.trim_end_matches('/'), path)
    }

    /// Absolute `redirect_uri`, if a relay page path is configured
    #[must_use]
    pub fn redirect_uri(&self) -> Option<String> {
        self.redirect_url.as_deref().map(|path| self.portal_url(path))
    }

    /// Scopes joined with spaces, `None` when no scope is configured
    #[must_use]
    pub fn scope_string(&self) -> Option<String> {
        if self.scopes.is_empty() {
            None
        } else {
            Some(self.scopes.join(" "))
        }
    }

    /// Check the fields every flow depends on
    ///
    /// # Errors
    /// Returns `SsoError::Config` naming the first empty required field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("url", &self.url),
            ("client_id", &self.client_id),
            ("endpoints.authorize", &self.endpoints.authorize),
            ("portal_origin", &self.portal_origin),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SsoError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Logging configuration consumed by the infra tracing initialiser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Inactivity timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Whether the inactivity timer runs
    pub enabled: bool,
    /// Idle minutes before the warning
    pub inactivity_interval_mins: u64,
    /// Minutes the warning stays up before logout
    pub logout_confirmation_interval_mins: u64,
}

impl IdleConfig {
    /// Inactivity interval as a [`Duration`]
    #[must_use]
    pub fn inactivity_interval(&self) -> Duration {
        Duration::from_secs(self.inactivity_interval_mins.saturating_mul(60))
    }

    /// Confirmation interval as a [`Duration`]
    #[must_use]
    pub fn logout_confirmation_interval(&self) -> Duration {
        Duration::from_secs(self.logout_confirmation_interval_mins.saturating_mul(60))
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inactivity_interval_mins: DEFAULT_INACTIVITY_INTERVAL_MINS,
            logout_confirmation_interval_mins: DEFAULT_LOGOUT_CONFIRMATION_INTERVAL_MINS,
        }
    }
}

/// Client ID registered with the identity provider for this build
///
/// Distribution builds register one client per released version, so the
/// version name is appended when it is known.
#[must_use]
pub fn portal_client_id(
    client_id_base: &str,
    version_name: Option<&str>,
    is_distribution_build: bool,
) -> String {
    match version_name {
        Some(version) if is_distribution_build && !version.is_empty() => {
            format!("{client_id_base}-{version}")
        }
        _ => client_id_base.to_string(),
    }
}
