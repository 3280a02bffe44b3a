//! Authorize URLs and the relayed hash fragment
//!
//! Builds implicit-grant authorize URLs (`response_type=token`) and parses the
//! URL-encoded fragment the token-relay page posts back.

use portal_sso_domain::{CsrfValidation, OAuthConfig};

use super::types::PendingAuthorization;

/// URLs for one authorize attempt
///
/// `plain` is the interactive authorize URL. `silent`, present only when the
/// config carries a silent-login parameter, is `plain` with that parameter
/// appended; it is navigated first and `plain` becomes the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeUrls {
    /// Authorize URL without the silent-login parameter
    pub plain: String,
    /// Authorize URL with the silent-login parameter, when configured
    pub silent: Option<String>,
}

impl AuthorizeUrls {
    /// Build the URLs for `pending` against `config`
    #[must_use]
    pub fn build(config: &OAuthConfig, pending: &PendingAuthorization) -> Self {
        let mut params: Vec<(&str, String)> = vec![
            ("response_type", "token".to_string()),
            ("client_id", config.client_id.clone()),
            ("nonce", pending.nonce.clone()),
        ];
        if let Some(redirect_uri) = config.redirect_uri() {
            params.push(("redirect_uri", redirect_uri));
        }
        if let Some(audience) = &config.audience {
            params.push(("audience", audience.clone()));
        }
        if let Some(scope) = config.scope_string() {
            params.push(("scope", scope));
        }
        params.push(("state", pending.state.clone()));

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let plain = format!("{}?{query}", config.authorize_endpoint());

        let silent = config
            .silent_login_param
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|param| format!("{plain}&{param}"));

        Self { plain, silent }
    }

    /// URL the hidden context navigates to
    #[must_use]
    pub fn navigate_url(&self) -> &str {
        self.silent.as_deref().unwrap_or(&self.plain)
    }

    /// Where to send the user when the silent attempt lands on an error page
    #[must_use]
    pub fn failure_redirect_url(&self) -> Option<&str> {
        self.silent.as_ref().map(|_| self.plain.as_str())
    }
}

/// Parameters of the hash fragment relayed from the token-relay page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeResponse {
    /// Granted access token
    pub access_token: Option<String>,
    /// Granted scopes, space-delimited
    pub scope: Option<String>,
    /// Echoed nonce
    pub nonce: Option<String>,
    /// Echoed state
    pub state: Option<String>,
    /// Provider error code
    pub error: Option<String>,
}

impl AuthorizeResponse {
    /// Parse `access_token=..&scope=..&nonce=..` (a leading `#` is allowed)
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut response = Self::default();
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            let slot = match key.as_ref() {
                "access_token" => &mut response.access_token,
                "scope" => &mut response.scope,
                "nonce" => &mut response.nonce,
                "state" => &mut response.state,
                "error" => &mut response.error,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        response
    }

    /// The anti-forgery value echoed for `mode`
    #[must_use]
    pub fn echoed(&self, mode: CsrfValidation) -> Option<&str> {
        match mode {
            CsrfValidation::Nonce => self.nonce.as_deref(),
            CsrfValidation::State => self.state.as_deref(),
        }
    }
}
