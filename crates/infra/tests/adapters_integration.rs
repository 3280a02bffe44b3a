//! Integration tests for the HTTP adapters
//!
//! Tests the portal HTTP client, the HTTP browsing engine and the JSON-RPC
//! transport together against a mock provider, through the full cookie/CSRF
//! login.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use portal_sso_common::auth::{BrowsingEngine, ContextId, MessageBus, NavigationFailure, TokenManager};
use portal_sso_common::testing::{login_page, provider_page, relay_fragment};
use portal_sso_core::{
    AuthServiceError, AuthSession, HostNavigator, PortalAuthenticator, TenantAuthService,
    UaaAuthService,
};
use portal_sso_domain::constants::LOGIN_REDIRECT_CHANNEL;
use portal_sso_domain::{Credentials, OAuthConfig};
use portal_sso_infra::{HttpBrowsingEngine, JsonRpcTransport, PortalHttpClient};

const SCOPE: &str = "openid guidewire.edge.policy.read.own";

#[derive(Default)]
struct RecordingNavigator(Mutex<Vec<String>>);

impl HostNavigator for RecordingNavigator {
    fn navigate_top(&self, url: &str) {
        self.0.lock().push(url.to_string());
    }
}

fn query_param(request: &Request, name: &str) -> String {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Mount a provider that only authorizes requests carrying the session cookie
async fn mount_provider(server: &MockServer) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page("csrf-1", None)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login.do"))
        .and(body_string_contains("X-Uaa-Csrf=csrf-1"))
        .and(body_string_contains("password=s3cret"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{base}/home"))
                .insert_header("Set-Cookie", "session=abc; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string(provider_page()))
        .mount(server)
        .await;

    let relay = format!("{base}/login-redirect.html");
    Mock::given(method("GET"))
        .and(path("/oauth/authorize"))
        .and(header("cookie", "session=abc"))
        .respond_with(move |request: &Request| {
            let fragment = relay_fragment(
                "portal-token",
                SCOPE,
                &query_param(request, "nonce"),
                &query_param(request, "state"),
            );
            ResponseTemplate::new(302).insert_header("Location", format!("{relay}#{fragment}"))
        })
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth/authorize"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{base}/login")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login-redirect.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(provider_page()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("Authorization", "Bearer portal-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "jdoe"})))
        .mount(server)
        .await;
}

struct Wiring {
    engine: Arc<HttpBrowsingEngine>,
    navigator: Arc<RecordingNavigator>,
    session: Arc<AuthSession>,
}

fn wire(server: &MockServer) -> Wiring {
    let base = server.uri();
    let config = OAuthConfig::new(base.clone(), "portal".to_string(), base.clone())
        .with_redirect_url("/login-redirect.html");
    let relay_page = config.redirect_uri().unwrap_or_default();

    let http = PortalHttpClient::new().unwrap();
    let bus = MessageBus::new();
    let engine = Arc::new(HttpBrowsingEngine::new(http.clone(), bus.clone(), relay_page));
    let transport = Arc::new(JsonRpcTransport::with_portal_client(&http, base));
    let navigator = Arc::new(RecordingNavigator::default());

    let manager = TokenManager::new(config, engine.clone(), bus);
    let session =
        Arc::new(AuthSession::new(manager, Arc::new(http), transport, navigator.clone()));
    Wiring { engine, navigator, session }
}

/// Validates the cookie/CSRF login over HTTP.
///
/// # Test Steps
/// 1. Scrape the CSRF token from the provider login page
/// 2. POST the credentials; the provider sets its session cookie
/// 3. Silently authorize with that cookie and relay the fragment
/// 4. Fetch the user profile with the relayed token
#[tokio::test]
async fn test_uaa_login_end_to_end() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let wiring = wire(&server);

    let user = UaaAuthService::new(Arc::clone(&wiring.session))
        .login(&Credentials::new("jdoe", "s3cret"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.user_name.as_deref(), Some("jdoe"));
    let tokens = wiring.session.token_manager().current_tokens().unwrap();
    assert_eq!(tokens.access_token, "portal-token");
    assert_eq!(tokens.authorities, vec!["guidewire.edge.policy.read.own".to_string()]);
    assert_eq!(wiring.engine.open_contexts(), 0);
    assert!(wiring.navigator.0.lock().is_empty());
}

/// Validates the multi-tenant lockout over HTTP.
///
/// # Test Steps
/// 1. The tenant authorize endpoint answers `403` with a lock message body
/// 2. Log in
/// 3. Verify `account_locked` and that no silent token request followed
#[tokio::test]
async fn test_tenant_account_locked_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/oauth/authorize"))
        .and(body_string_contains("client_id=uaa"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Your account has been locked"))
        .expect(1)
        .mount(&server)
        .await;
    let wiring = wire(&server);

    let err = TenantAuthService::new(Arc::clone(&wiring.session))
        .login(&Credentials::new("jdoe", "s3cret"))
        .await
        .unwrap_err();

    assert_eq!(err, AuthServiceError::AccountLocked);
    assert_eq!(err.code(), "account_locked");
    assert_eq!(wiring.engine.open_contexts(), 0);
    assert_eq!(wiring.session.token_manager().current_tokens(), None);
}

/// Validates that without the provider cookie the silent request reports
/// "not logged in" instead of a redirect.
#[tokio::test]
async fn test_silent_request_without_session() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let wiring = wire(&server);

    let err = wiring.session.test_for_oauth_token().await.unwrap_err();

    assert_eq!(err.code(), "notLoggedIn");
    assert_eq!(err.redirect(), None);
    assert_eq!(wiring.engine.open_contexts(), 0);
}

/// Validates redirect handling of the browsing engine.
///
/// Assertions:
/// - A fragment survives later hops without one.
/// - Landing on the relay page posts the fragment to the bus.
/// - Redirect loops fail after the hop limit.
#[tokio::test]
async fn test_engine_follows_redirects_and_relays() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/hop#access_token=t1&nonce=n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hop"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/relay.html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(provider_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let bus = MessageBus::new();
    let engine = HttpBrowsingEngine::new(
        PortalHttpClient::new().unwrap(),
        bus.clone(),
        format!("{base}/relay.html"),
    );
    let message = bus.wait_for_message(LOGIN_REDIRECT_CHANNEL, std::time::Duration::from_secs(5));

    let document = engine.navigate(ContextId(1), &format!("{base}/start")).await.unwrap();

    assert_eq!(document.url(), format!("{base}/relay.html#access_token=t1&nonce=n"));
    assert_eq!(message.await.unwrap(), json!("access_token=t1&nonce=n"));

    let err = engine.navigate(ContextId(2), &format!("{base}/loop")).await.err().unwrap();
    assert!(matches!(err, NavigationFailure::Network(msg) if msg.contains("redirects")));

    engine.discard(ContextId(1));
    engine.discard(ContextId(2));
    assert_eq!(engine.open_contexts(), 0);
}
