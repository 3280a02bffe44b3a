//! Traits for isolated browsing
//!
//! These traits abstract the hidden browsing context so the loader can be
//! driven by a real engine, an HTTP-only engine or a scripted test double.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::document::PageDocument;

/// Identifier of one hidden browsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Why a navigation did not land on a readable page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationFailure {
    /// The page landed but its document is not readable from the host
    /// (cross-origin). The caller must authorize at the top level instead.
    CrossOrigin,

    /// The navigation itself failed (network error, refused connection)
    Network(String),
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossOrigin => write!(f, "landed document is cross-origin"),
            Self::Network(msg) => write!(f, "navigation failed: {msg}"),
        }
    }
}

/// Engine hosting hidden, sandboxed browsing contexts
///
/// Each context is independent; concurrent navigations in different contexts
/// must not interfere with each other.
#[async_trait]
pub trait BrowsingEngine: Send + Sync {
    /// Create `context` (if new) and navigate it to `url`
    ///
    /// Resolves once the context has finished loading, following any
    /// redirects the provider issues.
    ///
    /// # Errors
    /// Returns [`NavigationFailure`] when the page cannot be loaded or read.
    async fn navigate(
        &self,
        context: ContextId,
        url: &str,
    ) -> Result<Arc<dyn PageDocument>, NavigationFailure>;

    /// Tear down `context` and everything attached to it
    ///
    /// Must be safe to call for a context that never finished loading.
    fn discard(&self, context: ContextId);
}
