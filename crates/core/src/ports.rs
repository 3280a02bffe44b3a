//! Port interfaces for portal login flows
//!
//! These traits define the boundaries between the login orchestration and
//! infrastructure implementations (HTTP client, JSON-RPC transport, the host
//! page's top-level navigation).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use portal_sso_domain::{LogoutMode, Result, UserProfile};

/// Final state of a request after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    /// URL of the last response in the redirect chain
    pub url: String,
    /// HTTP status; `0` for an opaque response
    pub status: u16,
    /// Reason phrase of the final response
    pub status_text: String,
    /// Body of an error response; empty for successes
    pub body: String,
}

impl FormResponse {
    /// Response with an empty body
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, status_text: impl Into<String>) -> Self {
        Self { url: url.into(), status, status_text: status_text.into(), body: String::new() }
    }

    /// Attach the response body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of `name` in the final URL's query string
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let url = url::Url::parse(&self.url).ok()?;
        let value = url.query_pairs().find(|(key, _)| key == name).map(|(_, v)| v.into_owned());
        value
    }
}

/// HTTP calls made by the login flows
///
/// Implementations share one cookie store across calls and with the
/// browsing engine, so a successful credential POST is visible to the next
/// silent token request.
#[async_trait]
pub trait SsoHttpClient: Send + Sync {
    /// POST `params` form-encoded to `url`, following redirects
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<FormResponse>;

    /// Call the provider logout endpoint in `mode`
    async fn fetch_logout(&self, url: &str, mode: LogoutMode) -> Result<FormResponse>;

    /// GET the user-info endpoint with a bearer token
    async fn get_user_info(&self, url: &str, access_token: &str) -> Result<UserProfile>;
}

/// Backend transport failure
///
/// `status` is the HTTP status when the failure came from the HTTP layer.
/// JSON-RPC errors carry their code inside `message` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transport error: {message}")]
pub struct TransportError {
    /// HTTP status of the failing call
    pub status: Option<u16>,
    /// Failure description
    pub message: String,
}

impl TransportError {
    /// Transport error from its parts
    #[must_use]
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// HTTP-like status code: the transport status, else the first number
    /// found in the message
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status.or_else(|| {
            self.message
                .split(|c: char| !c.is_ascii_digit())
                .find(|digits| !digits.is_empty())
                .and_then(|digits| digits.parse().ok())
        })
    }
}

/// JSON-RPC style backend calls (password reset, sign-up, single logout)
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Invoke `method` at `path` with `params`
    ///
    /// `access_token`, when given, is sent as a bearer authorization.
    async fn send(
        &self,
        path: &str,
        method: &str,
        params: Value,
        access_token: Option<&str>,
    ) -> std::result::Result<Value, TransportError>;
}

/// Top-level navigation of the host page
pub trait HostNavigator: Send + Sync {
    /// Leave the current page for `url`
    fn navigate_top(&self, url: &str);
}
