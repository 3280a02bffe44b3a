//! Mock implementations of the browsing engine
//!
//! [`ScriptedBrowsingEngine`] replays scripted navigation outcomes. Relay
//! steps read the nonce/state from the requested authorize URL and post the
//! fragment to the message bus exactly as the token-relay page would, so the
//! token manager's CSRF check sees a genuine echo.

// Test doubles keep their error docs in the types they return
#![allow(clippy::missing_errors_doc)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use portal_sso_domain::constants::{LOGIN_REDIRECT_CHANNEL, TOKEN_RELAY_PAGE};

use super::fixtures::{provider_page, relay_fragment};
use crate::auth::{
    BrowsingEngine, ContextId, HtmlDocument, MessageBus, NavigationFailure, PageDocument,
};

/// One scripted navigation outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Land on `url` with `html`
    Land { url: String, html: String },
    /// Relay a token echoing the requested nonce/state, then land on the
    /// relay page
    RelayToken { access_token: String, scope: String },
    /// Relay `fragment` verbatim, then land on the relay page
    RelayRaw { fragment: String },
    /// Fail the navigation
    Fail(NavigationFailure),
    /// Never finish loading
    Hang,
}

impl ScriptStep {
    /// Land on `url` with `html`
    #[must_use]
    pub fn land(url: &str, html: &str) -> Self {
        Self::Land { url: url.to_string(), html: html.to_string() }
    }

    /// Relay `access_token` with `scope`, echoing the request's nonce/state
    #[must_use]
    pub fn relay_token(access_token: &str, scope: &str) -> Self {
        Self::RelayToken { access_token: access_token.to_string(), scope: scope.to_string() }
    }

    /// Relay `fragment` verbatim
    #[must_use]
    pub fn relay_raw(fragment: &str) -> Self {
        Self::RelayRaw { fragment: fragment.to_string() }
    }
}

/// Browsing engine driven by a script instead of a network
///
/// Steps queued with [`push_step`](Self::push_step) are consumed in order.
/// Routes registered with [`route`](Self::route) answer every navigation
/// whose URL starts with the prefix, and take precedence over the queue.
/// An unscripted navigation fails with a network error.
pub struct ScriptedBrowsingEngine {
    bus: MessageBus,
    relay_page_url: String,
    steps: Mutex<VecDeque<ScriptStep>>,
    routes: Mutex<Vec<(String, ScriptStep)>>,
    visited: Mutex<Vec<String>>,
    open: Mutex<BTreeSet<ContextId>>,
}

impl ScriptedBrowsingEngine {
    /// Create an engine posting relays to `bus`
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            relay_page_url: format!("https://portal.example/{TOKEN_RELAY_PAGE}"),
            steps: Mutex::new(VecDeque::new()),
            routes: Mutex::new(Vec::new()),
            visited: Mutex::new(Vec::new()),
            open: Mutex::new(BTreeSet::new()),
        }
    }

    /// Land relay steps on `url` instead of the default relay page
    #[must_use]
    pub fn with_relay_page(mut self, url: &str) -> Self {
        self.relay_page_url = url.to_string();
        self
    }

    /// Queue a one-shot step
    pub fn push_step(&self, step: ScriptStep) {
        self.steps.lock().push_back(step);
    }

    /// Answer every navigation to `prefix*` with `step`
    pub fn route(&self, prefix: &str, step: ScriptStep) {
        self.routes.lock().push((prefix.to_string(), step));
    }

    /// URLs navigated so far, in order
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }

    /// Contexts created and not yet discarded
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        self.open.lock().len()
    }

    fn next_step(&self, url: &str) -> Option<ScriptStep> {
        let routed = self
            .routes
            .lock()
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, step)| step.clone());
        routed.or_else(|| self.steps.lock().pop_front())
    }

    fn relay(&self, fragment: String) -> Arc<dyn PageDocument> {
        let landed = format!("{}#{fragment}", self.relay_page_url);
        self.bus.post(json!({ LOGIN_REDIRECT_CHANNEL: fragment }));
        Arc::new(HtmlDocument::parse(landed, &provider_page()))
    }
}

fn query_param(url: &str, name: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned()))
        .unwrap_or_default()
}

#[async_trait]
impl BrowsingEngine for ScriptedBrowsingEngine {
    async fn navigate(
        &self,
        context: ContextId,
        url: &str,
    ) -> Result<Arc<dyn PageDocument>, NavigationFailure> {
        self.visited.lock().push(url.to_string());
        self.open.lock().insert(context);

        let step = self.next_step(url).unwrap_or_else(|| {
            ScriptStep::Fail(NavigationFailure::Network(format!("no scripted step for {url}")))
        });

        match step {
            ScriptStep::Land { url, html } => Ok(Arc::new(HtmlDocument::parse(url, &html))),
            ScriptStep::RelayToken { access_token, scope } => {
                let nonce = query_param(url, "nonce");
                let state = query_param(url, "state");
                Ok(self.relay(relay_fragment(&access_token, &scope, &nonce, &state)))
            }
            ScriptStep::RelayRaw { fragment } => Ok(self.relay(fragment)),
            ScriptStep::Fail(failure) => Err(failure),
            ScriptStep::Hang => std::future::pending().await,
        }
    }

    fn discard(&self, context: ContextId) {
        self.open.lock().remove(&context);
    }
}
