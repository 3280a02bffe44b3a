//! Account self-service
//!
//! Password reset and sign-up go through the backend transport; the reset
//! code shown by the provider's reset page is read from a hidden context.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use portal_sso_common::auth::{LoadRequest, TokenManager};
use portal_sso_domain::constants::{
    RESET_CODE_FIELD, RESET_CODE_PAGE_PATH, RESET_PASSWORD_PATH, RESET_PASSWORD_ROUTE, SIGNUP_PATH,
};
use portal_sso_domain::{PasswordChange, SignUpRequest};

use crate::login::AuthServiceError;
use crate::ports::{BackendTransport, TransportError};

/// Password reset, password change and sign-up
pub struct AccountService {
    transport: Arc<dyn BackendTransport>,
    manager: TokenManager,
}

impl fmt::Debug for AccountService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

impl AccountService {
    /// Account calls over `transport`, authenticated with `manager`'s token
    pub fn new(transport: Arc<dyn BackendTransport>, manager: TokenManager) -> Self {
        Self { transport, manager }
    }

    /// Ask the backend to email a reset link for `email`
    ///
    /// `page_url` is the portal page (origin and path) the reset link should
    /// return to; the reset route is appended to it.
    ///
    /// # Errors
    /// Returns [`AuthServiceError::EmailNotFound`] for an unknown address.
    pub async fn forgot_password(&self, email: &str, page_url: &str) -> Result<Value, AuthServiceError> {
        let params = json!([{
            "email": email,
            "newPasswordEntryUrl": format!("{page_url}{RESET_PASSWORD_ROUTE}"),
        }]);
        self.send(RESET_PASSWORD_PATH, "sendPasswordToken", params, 404, AuthServiceError::EmailNotFound)
            .await
    }

    /// Set a new password using the emailed reset code
    ///
    /// # Errors
    /// Returns [`AuthServiceError::InvalidTokenOrEmail`] when the code or the
    /// password is rejected.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<Value, AuthServiceError> {
        let params = json!([{ "code": change.code, "new_password": change.new_password }]);
        self.send(RESET_PASSWORD_PATH, "newPassword", params, 422, AuthServiceError::InvalidTokenOrEmail)
            .await
    }

    /// Create a user account
    ///
    /// # Errors
    /// Returns [`AuthServiceError::UserAlreadyExists`] when the user name or
    /// email is taken.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<Value, AuthServiceError> {
        self.send(SIGNUP_PATH, "createUser", request.to_params(), 409, AuthServiceError::UserAlreadyExists)
            .await
    }

    /// Exchange an emailed reset code for the one the reset form expects
    ///
    /// # Errors
    /// Returns [`AuthServiceError::Page`] when the reset page does not load
    /// and [`AuthServiceError::MissingPageElement`] when it has no code input.
    pub async fn verify_reset_code(&self, code: &str) -> Result<String, AuthServiceError> {
        let path = format!("{RESET_CODE_PAGE_PATH}?{RESET_CODE_FIELD}={}", urlencoding::encode(code));
        let url = self.manager.config().portal_url(&path);

        let context =
            self.manager.loader().load(LoadRequest::new(url)).await.map_err(AuthServiceError::Page)?;
        let verified = context.document().input_value(RESET_CODE_FIELD);
        context.release();

        verified.ok_or(AuthServiceError::MissingPageElement("reset code input"))
    }

    async fn send(
        &self,
        path: &str,
        method: &str,
        params: Value,
        expected_status: u16,
        expected_error: AuthServiceError,
    ) -> Result<Value, AuthServiceError> {
        match self.transport.send(path, method, params, None).await {
            Ok(response) => {
                info!(path, method, "Account request completed");
                Ok(response)
            }
            Err(err) => Err(classify(err, expected_status, expected_error, method)),
        }
    }
}

fn classify(
    err: TransportError,
    expected_status: u16,
    expected_error: AuthServiceError,
    method: &str,
) -> AuthServiceError {
    if err.status_code() == Some(expected_status) {
        debug!(method, status = expected_status, "Account request rejected");
        expected_error
    } else {
        warn!(method, error = %err, "Account request failed");
        AuthServiceError::Transport(err)
    }
}
