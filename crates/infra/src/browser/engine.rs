//! HTTP-backed isolated browsing engine
//!
//! Stands in for a hidden browser frame: redirects are followed one hop at a
//! time with the portal client's cookies, the URL fragment survives the
//! chain, and the landed HTML becomes an [`HtmlDocument`]. Landing on the
//! token-relay page with a fragment posts that fragment to the message bus,
//! which is what the relay page itself does in a browser.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::LOCATION;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use portal_sso_common::auth::{
    BrowsingEngine, ContextId, HtmlDocument, MessageBus, NavigationFailure, PageDocument,
};
use portal_sso_domain::constants::LOGIN_REDIRECT_CHANNEL;

use crate::http::PortalHttpClient;

/// Browsing engine that loads pages over HTTP
pub struct HttpBrowsingEngine {
    http: PortalHttpClient,
    bus: MessageBus,
    relay_page: String,
    open: Mutex<BTreeSet<ContextId>>,
}

impl std::fmt::Debug for HttpBrowsingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBrowsingEngine")
            .field("relay_page", &self.relay_page)
            .field("open_contexts", &self.open_contexts())
            .finish_non_exhaustive()
    }
}

impl HttpBrowsingEngine {
    /// `relay_page` is the absolute URL of the token-relay page, usually
    /// `OAuthConfig::redirect_uri()`
    pub fn new(http: PortalHttpClient, bus: MessageBus, relay_page: impl Into<String>) -> Self {
        Self { http, bus, relay_page: relay_page.into(), open: Mutex::new(BTreeSet::new()) }
    }

    /// Contexts navigated and not yet discarded
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        self.open.lock().len()
    }

    fn is_relay_page(&self, url: &Url) -> bool {
        let mut page = url.clone();
        page.set_fragment(None);
        page.set_query(None);
        page.as_str().trim_end_matches('/') == self.relay_page.trim_end_matches('/')
    }

    /// Follow the redirect chain from `start`, returning the landed URL and body
    async fn fetch(&self, start: Url) -> Result<(Url, String), NavigationFailure> {
        let mut current = start;

        for _ in 0..=self.http.max_redirects() {
            let mut request_url = current.clone();
            request_url.set_fragment(None);

            let response = self
                .http
                .navigation_client()
                .get(request_url)
                .send()
                .await
                .map_err(|err| NavigationFailure::Network(err.to_string()))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        NavigationFailure::Network(format!("redirect without location ({status})"))
                    })?;
                let mut next = current
                    .join(location)
                    .map_err(|err| NavigationFailure::Network(format!("bad redirect: {err}")))?;
                if next.fragment().is_none() {
                    next.set_fragment(current.fragment());
                }
                debug!(status = status.as_u16(), "Following redirect");
                current = next;
                continue;
            }

            if status.is_server_error() {
                return Err(NavigationFailure::Network(format!("HTTP {}", status.as_u16())));
            }

            let body = response
                .text()
                .await
                .map_err(|err| NavigationFailure::Network(err.to_string()))?;
            return Ok((current, body));
        }

        Err(NavigationFailure::Network(format!(
            "more than {} redirects",
            self.http.max_redirects()
        )))
    }
}

#[async_trait]
impl BrowsingEngine for HttpBrowsingEngine {
    async fn navigate(
        &self,
        context: ContextId,
        url: &str,
    ) -> Result<Arc<dyn PageDocument>, NavigationFailure> {
        self.open.lock().insert(context);
        let start = Url::parse(url).map_err(|err| NavigationFailure::Network(err.to_string()))?;

        let (landed, body) = self.fetch(start).await?;

        if self.is_relay_page(&landed) {
            match landed.fragment().filter(|fragment| !fragment.is_empty()) {
                Some(fragment) => {
                    let listeners =
                        self.bus.post(json!({ LOGIN_REDIRECT_CHANNEL: fragment }));
                    debug!(%context, listeners, "Relayed authorize response");
                }
                None => warn!(%context, "Relay page reached without a fragment"),
            }
        }

        Ok(Arc::new(HtmlDocument::parse(landed.as_str(), &body)))
    }

    fn discard(&self, context: ContextId) {
        self.open.lock().remove(&context);
    }
}
