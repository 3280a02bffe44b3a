//! # Portal SSO Infrastructure
//!
//! Infrastructure implementations of the portal SSO ports.
//!
//! This crate contains:
//! - The reqwest-based portal HTTP client (shared cookie jar)
//! - An HTTP-backed isolated browsing engine
//! - The JSON-RPC backend transport
//! - Configuration loading and tracing initialisation
//!
//! ## Architecture
//! - Implements traits defined in `portal-sso-core` and `portal-sso-common`
//! - Contains all "impure" code (network I/O, files, environment)

pub mod browser;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod rpc;

// Re-export commonly used items
pub use browser::HttpBrowsingEngine;
pub use errors::InfraError;
pub use http::{HttpClientBuilder, PortalHttpClient};
pub use logging::init_tracing;
pub use rpc::JsonRpcTransport;
