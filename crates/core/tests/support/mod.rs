//! Shared test helpers for `portal-sso-core` integration tests.
//!
//! These helpers provide recording doubles for the core ports and a harness
//! wiring them to a token manager driven by the scripted browsing engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use portal_sso_common::auth::{MessageBus, TokenManager};
use portal_sso_common::testing::ScriptedBrowsingEngine;
use portal_sso_core::{
    AuthSession, BackendTransport, FormResponse, HostNavigator, SsoHttpClient, TransportError,
};
use portal_sso_domain::{
    LogoutMode, OAuthConfig, Result as SsoResult, SessionEvent, SsoError, UserProfile,
};

pub const PORTAL: &str = "https://portal.example";
pub const IDP: &str = "https://idp.example";

/// One recorded form POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl RecordedPost {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

/// HTTP port double with queued form responses
#[derive(Default)]
pub struct MockHttpClient {
    form_responses: Mutex<VecDeque<SsoResult<FormResponse>>>,
    logout_failure: Mutex<Option<SsoError>>,
    profile: Mutex<UserProfile>,
    posts: Mutex<Vec<RecordedPost>>,
    logouts: Mutex<Vec<(String, LogoutMode)>>,
    userinfo_tokens: Mutex<Vec<String>>,
}

impl MockHttpClient {
    pub fn push_form_response(&self, url: &str, status: u16, status_text: &str) {
        self.form_responses.lock().push_back(Ok(FormResponse::new(url, status, status_text)));
    }

    pub fn push_form_error(&self, err: SsoError) {
        self.form_responses.lock().push_back(Err(err));
    }

    pub fn fail_logout(&self, err: SsoError) {
        *self.logout_failure.lock() = Some(err);
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock() = profile;
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().clone()
    }

    pub fn logouts(&self) -> Vec<(String, LogoutMode)> {
        self.logouts.lock().clone()
    }

    pub fn userinfo_tokens(&self) -> Vec<String> {
        self.userinfo_tokens.lock().clone()
    }
}

#[async_trait]
impl SsoHttpClient for MockHttpClient {
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> SsoResult<FormResponse> {
        self.posts.lock().push(RecordedPost {
            url: url.to_string(),
            params: params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        });
        self.form_responses.lock().pop_front().unwrap_or_else(|| {
            Ok(FormResponse::new(url, 200, "OK"))
        })
    }

    async fn fetch_logout(&self, url: &str, mode: LogoutMode) -> SsoResult<FormResponse> {
        self.logouts.lock().push((url.to_string(), mode));
        match self.logout_failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(FormResponse::new(url, 0, "")),
        }
    }

    async fn get_user_info(&self, _url: &str, access_token: &str) -> SsoResult<UserProfile> {
        self.userinfo_tokens.lock().push(access_token.to_string());
        Ok(self.profile.lock().clone())
    }
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub method: String,
    pub params: Value,
    pub access_token: Option<String>,
}

/// Backend transport double
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BackendTransport for MockTransport {
    async fn send(
        &self,
        path: &str,
        method: &str,
        params: Value,
        access_token: Option<&str>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().push(RecordedCall {
            path: path.to_string(),
            method: method.to_string(),
            params,
            access_token: access_token.map(str::to_string),
        });
        Ok(json!({"result": null}))
    }
}

/// Host navigator double
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }
}

impl HostNavigator for RecordingNavigator {
    fn navigate_top(&self, url: &str) {
        self.visited.lock().push(url.to_string());
    }
}

/// Everything a login flow touches, with handles to inspect each double
pub struct Harness {
    pub engine: Arc<ScriptedBrowsingEngine>,
    pub http: Arc<MockHttpClient>,
    pub transport: Arc<MockTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: Arc<AuthSession>,
}

impl Harness {
    pub fn new(config: OAuthConfig) -> Self {
        let bus = MessageBus::new();
        let engine = Arc::new(ScriptedBrowsingEngine::new(bus.clone()));
        let manager = TokenManager::new(config, engine.clone(), bus);
        let http = Arc::new(MockHttpClient::default());
        let transport = Arc::new(MockTransport::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let session = Arc::new(AuthSession::new(
            manager,
            http.clone(),
            transport.clone(),
            navigator.clone(),
        ));
        Self { engine, http, transport, navigator, session }
    }

    /// Record every session event
    pub fn record_events(&self) -> (Arc<Mutex<Vec<SessionEvent>>>, portal_sso_core::Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = self.session.on_login_state_change(move |event| {
            sink.lock().push(event.clone());
        });
        (events, subscription)
    }
}

pub fn config() -> OAuthConfig {
    OAuthConfig::new(IDP.to_string(), "portal".to_string(), PORTAL.to_string())
        .with_redirect_url("/login-redirect.html")
}

pub fn profile(name: &str) -> UserProfile {
    UserProfile { name: Some(name.to_string()), ..UserProfile::default() }
}
