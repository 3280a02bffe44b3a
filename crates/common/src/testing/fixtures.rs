//! Test fixture generators
//!
//! Tokens produced here are unsigned; nothing in the portal verifies
//! signatures client-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

use portal_sso_domain::constants::LOGIN_CSRF_FIELD;

/// Build an unsigned `header.payload.signature` token carrying `claims`
///
/// # Examples
///
/// ```
/// use portal_sso_common::auth::decode_claims;
/// use portal_sso_common::testing::fixtures::fake_jwt;
///
/// let token = fake_jwt(&serde_json::json!({"iat": 1000, "exp": 1100}));
/// assert_eq!(decode_claims(&token).unwrap().exp, Some(1100));
/// ```
#[must_use]
pub fn fake_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Hash fragment the token-relay page would post for a granted token
#[must_use]
pub fn relay_fragment(access_token: &str, scope: &str, nonce: &str, state: &str) -> String {
    format!(
        "access_token={}&token_type=bearer&scope={}&nonce={}&state={}",
        urlencoding::encode(access_token),
        urlencoding::encode(scope),
        urlencoding::encode(nonce),
        urlencoding::encode(state),
    )
}

/// Minimal page carrying the provider marker
#[must_use]
pub fn provider_page() -> String {
    r#"<html><head><meta name="brand" content="Guidewire"></head><body></body></html>"#
        .to_string()
}

/// Provider login page with a CSRF input and an optional external IdP link
#[must_use]
pub fn login_page(csrf_token: &str, external_link: Option<&str>) -> String {
    let link = external_link
        .map(|href| format!(r#"<a class="idp" href="{href}">Sign in</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><head><meta content="Cloud Foundry"></head><body>
<form action="/login.do" method="post">
  <input type="hidden" name="{LOGIN_CSRF_FIELD}" value="{csrf_token}"/>
  <input name="username" type="text"/>
</form>
{link}
</body></html>"#
    )
}

/// Generate a random alphanumeric string of `len` characters
#[must_use]
pub fn random_string(len: usize) -> String {
    use rand::distributions::Alphanumeric;

    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// Generate a random email address
#[must_use]
pub fn random_email() -> String {
    format!("{}@example.com", random_string(10).to_lowercase())
}
