//! Conversions from external infrastructure errors into domain errors.

use portal_sso_domain::SsoError;
use reqwest::Error as HttpError;
use reqwest::StatusCode;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SsoError);

impl From<InfraError> for SsoError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SsoError> for InfraError {
    fn from(value: SsoError) -> Self {
        Self(value)
    }
}

trait IntoSsoError {
    fn into_sso(self) -> SsoError;
}

/// Domain error for a non-success HTTP status
#[must_use]
pub fn status_error(status: StatusCode) -> SsoError {
    let code = status.as_u16();
    let message = format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

    match code {
        401 | 403 => SsoError::Auth(message),
        400..=499 => SsoError::InvalidInput(message),
        _ => SsoError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SsoError */
/* -------------------------------------------------------------------------- */

impl IntoSsoError for HttpError {
    fn into_sso(self) -> SsoError {
        if self.is_timeout() {
            return SsoError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return SsoError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return SsoError::Serialization(format!("invalid response body: {self}"));
        }

        if self.is_builder() {
            return SsoError::InvalidInput(format!("invalid request: {self}"));
        }

        if let Some(status) = self.status() {
            return status_error(status);
        }

        SsoError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_sso())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for errors::conversions.
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(StatusCode::FORBIDDEN), SsoError::Auth(msg) if msg.contains("403")));
        assert!(matches!(status_error(StatusCode::NOT_FOUND), SsoError::InvalidInput(_)));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY), SsoError::Network(_)));
    }

    /// Validates reqwest status errors.
    ///
    /// Assertions:
    /// - A 401 from `error_for_status` maps to an auth error naming the
    ///   status.
    #[tokio::test]
    async fn test_http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: SsoError = InfraError::from(error).into();
        match mapped {
            SsoError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_network_error() {
        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get("http://127.0.0.1:9/").send().await.unwrap_err();

        let mapped: SsoError = InfraError::from(error).into();
        assert!(matches!(mapped, SsoError::Network(_)));
    }
}
