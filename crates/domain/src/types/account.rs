//! Credential and account self-service inputs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Username/password pair submitted to a login endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Plain-text password; redacted in `Debug`
    pub password: String,
}

impl Credentials {
    /// Credentials for `username`
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// New-account registration request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    /// First name
    pub given_name: String,
    /// Last name
    pub family_name: String,
    /// Requested login name
    pub user_name: String,
    /// Contact and login email
    pub email: String,
    /// Initial password
    pub password: String,
}

impl SignUpRequest {
    /// SCIM-shaped parameters expected by the `createUser` backend method
    #[must_use]
    pub fn to_params(&self) -> serde_json::Value {
        serde_json::json!([{
            "name": {
                "givenName": self.given_name,
                "familyName": self.family_name,
            },
            "emails": [{ "value": self.email, "primary": true }],
            "userName": self.user_name,
            "password": self.password,
        }])
    }
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Password change authorised by a reset code
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChange {
    /// Reset code from the emailed link
    pub code: String,
    /// Password to set
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").field("code", &self.code).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let rendered = format!("{creds:?}");

        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn sign_up_params_use_scim_shape() {
        let request = SignUpRequest {
            given_name: "Ada".into(),
            family_name: "Lovelace".into(),
            user_name: "ada".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
        };
        let params = request.to_params();

        assert_eq!(params[0]["name"]["givenName"], "Ada");
        assert_eq!(params[0]["emails"][0]["primary"], true);
        assert_eq!(params[0]["userName"], "ada");
    }
}
