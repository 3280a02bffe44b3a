//! Error classification shared by every portal SSO error type
//!
//! Each module owns its own `thiserror` enum; this module only defines how
//! those enums describe themselves to callers deciding whether to retry,
//! redirect or alert.
//!
//! # ErrorClassification Trait
//!
//! All error types in the workspace implement `ErrorClassification` to
//! provide:
//!
//! - **`is_retryable()`**: Can this operation be retried?
//! - **`severity()`**: How serious is this error? (Info/Warning/Error/Critical)
//! - **`is_critical()`**: Does this require immediate attention?
//! - **`retry_after()`**: Suggested retry delay (if applicable)
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Not logged in, email not found |
//! | **Warning** | Transient failures | Load or message timeouts |
//! | **Error** | Failure requiring attention | Navigation errors, missing tokens |
//! | **Critical** | Integrity at risk | Nonce/state mismatch |
//!
//! ## Example
//!
//! ```rust,ignore
//! use portal_sso_common::error::ErrorClassification;
//!
//! match manager.request_access_token(None).await {
//!     Err(e) if e.is_retryable() => schedule_retry(e.retry_after()),
//!     Err(e) if e.is_critical() => alert(e),
//!     other => other,
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as a hidden context that did not finish loading in time.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging and alerting decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
