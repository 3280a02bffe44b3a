//! Testing utilities and helpers
//!
//! This module provides:
//! - **[`fixtures`]**: unsigned JWTs, relay fragments and provider pages
//! - **[`mocks`]**: a scripted browsing engine standing in for hidden
//!   contexts
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use std::sync::Arc;
//!
//! use portal_sso_common::auth::MessageBus;
//! use portal_sso_common::testing::{ScriptStep, ScriptedBrowsingEngine};
//!
//! let bus = MessageBus::new();
//! let engine = Arc::new(ScriptedBrowsingEngine::new(bus.clone()));
//! engine.push_step(ScriptStep::relay_token("abc", "guidewire.edge.policy.write.all"));
//! # }
//! ```

pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use fixtures::{
    fake_jwt, login_page, provider_page, random_email, random_string, relay_fragment,
};
pub use mocks::{ScriptStep, ScriptedBrowsingEngine};
