//! Error types used throughout the portal SSO crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain error for configuration and adapter failures
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SsoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for portal SSO operations
pub type Result<T> = std::result::Result<T, SsoError>;
