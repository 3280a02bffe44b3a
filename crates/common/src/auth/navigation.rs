//! Isolated navigation loader
//!
//! Navigates a fresh hidden context to a URL and decides, from where it
//! landed, whether the silent round-trip worked:
//!
//! 1. A page without a provider marker means the provider handed off to an
//!    external login page; a top-level redirect is required.
//! 2. A landed URL missing the expected substring means the user is not
//!    logged in.
//! 3. An expected landing whose URL also carries an error marker sends the
//!    user to the failure redirect.
//!
//! Failed loads discard their context. Successful loads hand the context to
//! the caller, who must [`LoadedContext::release`] it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use portal_sso_domain::constants::{LANDED_URL_ERROR_MARKER, PROVIDER_PAGE_MARKERS};

use super::document::PageDocument;
use super::traits::{BrowsingEngine, ContextId, NavigationFailure};
use crate::error::{ErrorClassification, ErrorSeverity};

/// Loader failure reasons
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Hidden context did not load within {0:?}")]
    Timeout(Duration),

    #[error("Hidden context landed on unexpected location {landed}")]
    UnexpectedLocation { landed: String },

    /// Carries the URL to navigate to at the top level, when one is known
    #[error("Full page redirect required")]
    ExternalRedirectRequired(Option<String>),

    #[error("Landed document is not readable from the host page")]
    CrossOrigin,

    #[error("Navigation error: {0}")]
    Navigation(String),
}

impl LoadError {
    /// Stable code for callers reacting to classified failures
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "loadTimeout",
            Self::UnexpectedLocation { .. } => "expectedSrcPartOnLoad",
            Self::ExternalRedirectRequired(_) => "fullPageRedirectRequired",
            Self::CrossOrigin => "authorizeWithoutIFrame",
            Self::Navigation(_) => "iframeLoadError",
        }
    }
}

impl ErrorClassification for LoadError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Navigation(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::UnexpectedLocation { .. }
            | Self::ExternalRedirectRequired(_)
            | Self::CrossOrigin => ErrorSeverity::Info,
            Self::Navigation(_) => ErrorSeverity::Error,
        }
    }
}

impl From<NavigationFailure> for LoadError {
    fn from(failure: NavigationFailure) -> Self {
        match failure {
            NavigationFailure::CrossOrigin => Self::CrossOrigin,
            NavigationFailure::Network(msg) => Self::Navigation(msg),
        }
    }
}

/// What to load and how to judge the landing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// URL the hidden context navigates to
    pub url: String,
    /// Substring the landed URL must contain
    pub expected_location: Option<String>,
    /// Top-level redirect reported when the landing carries an error marker
    pub failure_redirect_url: Option<String>,
}

impl LoadRequest {
    /// Load `url` with no landing expectations
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), expected_location: None, failure_redirect_url: None }
    }

    /// Require the landed URL to contain `substring`
    #[must_use]
    pub fn expecting(mut self, substring: impl Into<String>) -> Self {
        self.expected_location = Some(substring.into());
        self
    }

    /// Set the top-level redirect used on provider-side failures
    #[must_use]
    pub fn with_failure_redirect(mut self, url: Option<impl Into<String>>) -> Self {
        self.failure_redirect_url = url.map(Into::into);
        self
    }
}

/// A hidden context that landed where it was expected
///
/// Not released on drop: the caller reads what it needs, then calls
/// [`release`](Self::release).
pub struct LoadedContext {
    id: ContextId,
    document: Arc<dyn PageDocument>,
    engine: Arc<dyn BrowsingEngine>,
    released: AtomicBool,
}

impl LoadedContext {
    /// Context the document was loaded in
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Landed document
    #[must_use]
    pub fn document(&self) -> &dyn PageDocument {
        self.document.as_ref()
    }

    /// URL the context landed on
    #[must_use]
    pub fn url(&self) -> &str {
        self.document.url()
    }

    /// Tear down the context; later calls are no-ops
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.engine.discard(self.id);
            debug!(context = %self.id, "Released hidden context");
        }
    }

    /// Whether [`release`](Self::release) has run
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for LoadedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedContext")
            .field("id", &self.id)
            .field("url", &self.url())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Loads URLs in hidden contexts with a per-attempt timeout
pub struct IsolatedLoader {
    engine: Arc<dyn BrowsingEngine>,
    timeout: Duration,
    next_context: AtomicU64,
}

impl IsolatedLoader {
    /// Loader over `engine`, failing attempts after `timeout`
    #[must_use]
    pub fn new(engine: Arc<dyn BrowsingEngine>, timeout: Duration) -> Self {
        Self { engine, timeout, next_context: AtomicU64::new(1) }
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load `request.url` in a fresh hidden context
    ///
    /// # Errors
    /// Returns [`LoadError`] on timeout, navigation failure, or a landing
    /// that does not satisfy the request. The context is discarded first.
    pub async fn load(&self, request: LoadRequest) -> Result<LoadedContext, LoadError> {
        let id = ContextId(self.next_context.fetch_add(1, Ordering::Relaxed));
        debug!(context = %id, "Loading hidden context");

        let landed =
            match tokio::time::timeout(self.timeout, self.engine.navigate(id, &request.url)).await {
                Ok(Ok(document)) => document,
                Ok(Err(failure)) => {
                    self.engine.discard(id);
                    warn!(context = %id, %failure, "Hidden context failed to load");
                    return Err(failure.into());
                }
                Err(_) => {
                    self.engine.discard(id);
                    warn!(context = %id, timeout_ms = self.timeout.as_millis(), "Hidden context timed out");
                    return Err(LoadError::Timeout(self.timeout));
                }
            };

        if let Err(err) = check_landing(landed.as_ref(), &request) {
            self.engine.discard(id);
            debug!(context = %id, code = err.code(), "Hidden context landing rejected");
            return Err(err);
        }

        Ok(LoadedContext {
            id,
            document: landed,
            engine: Arc::clone(&self.engine),
            released: AtomicBool::new(false),
        })
    }
}

fn check_landing(document: &dyn PageDocument, request: &LoadRequest) -> Result<(), LoadError> {
    let landed = document.url();

    if !document.has_any_meta_content(&PROVIDER_PAGE_MARKERS) {
        return Err(LoadError::ExternalRedirectRequired(Some(landed.to_string())));
    }

    if let Some(expected) = &request.expected_location {
        if !landed.contains(expected.as_str()) {
            return Err(LoadError::UnexpectedLocation { landed: landed.to_string() });
        }
        if landed.contains(LANDED_URL_ERROR_MARKER) {
            return Err(LoadError::ExternalRedirectRequired(request.failure_redirect_url.clone()));
        }
    }

    Ok(())
}
