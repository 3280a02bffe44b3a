//! Token acquisition core shared across the portal SSO crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, JWT claims, CSRF nonce/state, scope authorities,
//!   authorize URLs, page documents
//! - `runtime`: tokio-based isolated loader, message channel, token manager
//!   and refresh schedule
//! - `observability`: tracing (implied by `runtime`)
//! - `test-utils`: scripted browsing engine and token fixtures

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;
#[cfg(feature = "foundation")]
pub mod error;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "runtime", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
