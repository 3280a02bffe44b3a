use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::redirect::Policy;
use reqwest::{Client as ReqwestClient, ClientBuilder, Response};
use tracing::debug;

use portal_sso_core::{FormResponse, SsoHttpClient};
use portal_sso_domain::{LogoutMode, Result, UserProfile};

use crate::errors::{status_error, InfraError};

const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Portal HTTP client backed by one shared cookie jar.
///
/// Every request made through this client, and through any browsing engine
/// built from it, reads and writes the same cookies. A credential POST
/// therefore establishes the provider session the next silent token request
/// relies on.
#[derive(Clone)]
pub struct PortalHttpClient {
    client: ReqwestClient,
    navigation: ReqwestClient,
    jar: Arc<Jar>,
    max_redirects: usize,
}

impl fmt::Debug for PortalHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalHttpClient")
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl PortalHttpClient {
    /// Start building a new portal HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Cookie store shared by every request of this client
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Underlying client; follows redirects and shares the cookie jar
    #[must_use]
    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }

    /// Redirect limit applied to form posts and hidden navigations
    #[must_use]
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Client sharing the cookie jar that never follows redirects itself
    pub(crate) fn navigation_client(&self) -> &ReqwestClient {
        &self.navigation
    }
}

/// Final URL and status of `response`; the body is kept for error statuses
///
/// reqwest only exposes the canonical reason phrase, so the body is the one
/// place a server-specific failure description survives.
async fn form_response(response: Response) -> Result<FormResponse> {
    let status = response.status();
    let landed = FormResponse::new(
        response.url().to_string(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
    );
    if status.is_success() {
        return Ok(landed);
    }
    let body = response.text().await.map_err(InfraError::from)?;
    Ok(landed.with_body(body))
}

#[async_trait]
impl SsoHttpClient for PortalHttpClient {
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<FormResponse> {
        debug!(%url, "Posting form");
        let response = self.client.post(url).form(params).send().await.map_err(InfraError::from)?;
        let landed = form_response(response).await?;
        debug!(url = %landed.url, status = landed.status, "Form post completed");
        Ok(landed)
    }

    async fn fetch_logout(&self, url: &str, mode: LogoutMode) -> Result<FormResponse> {
        let response = self.client.get(url).send().await.map_err(InfraError::from)?;

        if mode.is_opaque() {
            debug!(%url, "Opaque logout request sent");
            return Ok(FormResponse::new(url, 0, ""));
        }

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        form_response(response).await
    }

    async fn get_user_info(&self, url: &str, access_token: &str) -> Result<UserProfile> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(InfraError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        let profile = response.json::<UserProfile>().await.map_err(InfraError::from)?;
        Ok(profile)
    }
}

/// Builder for [`PortalHttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_redirects: usize,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    jar: Option<Arc<Jar>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
            default_headers: None,
            jar: None,
        }
    }
}

impl HttpClientBuilder {
    /// Request timeout (default 30 seconds)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum number of redirects followed per request.
    pub fn max_redirects(mut self, redirects: usize) -> Self {
        self.max_redirects = redirects;
        self
    }

    /// `User-Agent` header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers sent with every request
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Use an existing cookie store instead of a fresh one.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = Some(jar);
        self
    }

    fn client_builder(&self, jar: &Arc<Jar>) -> ClientBuilder {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .cookie_provider(Arc::clone(jar))
            .no_proxy();

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        if let Some(headers) = &self.default_headers {
            builder = builder.default_headers(headers.clone());
        }

        builder
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns `SsoError::InvalidInput` when reqwest rejects the settings.
    pub fn build(self) -> Result<PortalHttpClient> {
        let jar = self.jar.clone().unwrap_or_default();

        let client = self
            .client_builder(&jar)
            .redirect(Policy::limited(self.max_redirects))
            .build()
            .map_err(InfraError::from)?;
        let navigation = self
            .client_builder(&jar)
            .redirect(Policy::none())
            .build()
            .map_err(InfraError::from)?;

        Ok(PortalHttpClient { client, navigation, jar, max_redirects: self.max_redirects })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for http::client.
    use portal_sso_domain::SsoError;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> PortalHttpClient {
        PortalHttpClient::builder().timeout(Duration::from_secs(5)).build().unwrap()
    }

    /// Validates that form posts report where the redirect chain ended.
    ///
    /// Assertions:
    /// - The final URL keeps the error marker query.
    /// - Status and status text describe the last response.
    #[tokio::test]
    async fn test_post_form_reports_final_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login.do"))
            .and(body_string_contains("username=jdoe"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/login?error=login_failure", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = client()
            .post_form(&format!("{}/login.do", server.uri()), &[("username", "jdoe")])
            .await
            .unwrap();

        assert_eq!(response.url, format!("{}/login?error=login_failure", server.uri()));
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.query_param("error").as_deref(), Some("login_failure"));
    }

    /// Validates that error responses keep their body.
    ///
    /// Assertions:
    /// - The status text is the canonical reason phrase.
    /// - The body carries the server's own failure description.
    #[tokio::test]
    async fn test_post_form_keeps_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sso/oauth/authorize"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Account locked"))
            .mount(&server)
            .await;

        let response = client()
            .post_form(&format!("{}/sso/oauth/authorize", server.uri()), &[("username", "jdoe")])
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(response.status_text, "Forbidden");
        assert_eq!(response.body, "Account locked");
    }

    /// Validates both logout modes.
    ///
    /// Assertions:
    /// - `cors` surfaces a failing status.
    /// - `no-cors` treats the same response as an opaque success.
    #[tokio::test]
    async fn test_fetch_logout_modes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logout.do"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let url = format!("{}/logout.do", server.uri());
        let client = client();

        let err = client.fetch_logout(&url, LogoutMode::Cors).await.unwrap_err();
        assert!(matches!(err, SsoError::Network(msg) if msg.contains("500")));

        let opaque = client.fetch_logout(&url, LogoutMode::NoCors).await.unwrap();
        assert_eq!(opaque.status, 0);
        assert_eq!(opaque.url, url);
    }

    #[tokio::test]
    async fn test_get_user_info_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"user_name": "jdoe", "email": "j@doe.example"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let profile = client().get_user_info(&format!("{}/userinfo", server.uri()), "abc").await.unwrap();

        assert_eq!(profile.user_name.as_deref(), Some("jdoe"));
        assert_eq!(profile.email.as_deref(), Some("j@doe.example"));
    }
}
