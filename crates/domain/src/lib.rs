//! # Portal SSO Domain
//!
//! Domain types shared by every portal SSO crate.
//!
//! This crate contains:
//! - OAuth and portal configuration structures
//! - Session-state event payloads and credentials
//! - Domain error types and Result definitions
//! - Protocol constants (channel names, well-known paths)
//!
//! ## Architecture
//! - No dependencies on other portal SSO crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
