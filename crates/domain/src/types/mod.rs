//! Domain types
//!
//! Session-state payloads and account self-service inputs.

pub mod account;
pub mod session;

pub use account::*;
pub use session::*;
