//! Session-state types
//!
//! Payloads broadcast to session listeners on every login and logout
//! transition.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// User profile returned by the identity provider's user-info endpoint
///
/// UAA reports the login name as `user_name`, Auth0 as `name`; call
/// [`UserProfile::normalized`] before handing the profile to listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Login name, normalised from `name` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Every other claim the provider returned
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl UserProfile {
    /// Fill `user_name` from `name` when the provider omitted it
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.user_name.is_none() {
            self.user_name.clone_from(&self.name);
        }
        self
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// Explicit logout call
    UserRequested,
    /// Background token refresh failed
    RefreshFailed,
    /// Inactivity confirmation window elapsed
    Inactivity,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UserRequested => "user_requested",
            Self::RefreshFailed => "refresh_failed",
            Self::Inactivity => "inactivity",
        };
        f.write_str(s)
    }
}

/// Who triggered a logout transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutTrigger {
    /// Why the session ended
    pub reason: LogoutReason,
    /// `origin` claim of the removed token, i.e. the issuing provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl LogoutTrigger {
    /// Trigger for `reason`, naming the token's issuer
    #[must_use]
    pub fn new(reason: LogoutReason, origin: Option<String>) -> Self {
        Self { reason, origin }
    }
}

/// Session-state change delivered to every registered listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Whether the transition is a login
    pub is_logged_in: bool,
    /// Profile of the user who logged in
    pub user_data: Option<UserProfile>,
    /// Who ended the session, for logout transitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<LogoutTrigger>,
}

impl SessionEvent {
    /// Login transition for `user`
    #[must_use]
    pub fn logged_in(user: UserProfile) -> Self {
        Self { is_logged_in: true, user_data: Some(user.normalized()), trigger: None }
    }

    /// Logout transition caused by `trigger`
    #[must_use]
    pub fn logged_out(trigger: Option<LogoutTrigger>) -> Self {
        Self { is_logged_in: false, user_data: None, trigger }
    }
}
