//! Firebase Authentication over REST.
//!
//! Account operations go to the Identity Toolkit API
//! (`identitytoolkit.googleapis.com/v1/accounts:*`), token refresh to the
//! Secure Token API. Sign-in responses do not reliably carry
//! `emailVerified`, so every successful sign-in is followed by an
//! `accounts:lookup` to build the session object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::instrument;
use url::Url;

use hapus_core::{AuthUser, Email, UserId};

use super::{AuthError, AuthTokens, IdentityProvider, ProviderSession};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Identity Toolkit client.
#[derive(Clone)]
pub struct FirebaseIdentityProvider {
    inner: Arc<FirebaseIdentityProviderInner>,
}

struct FirebaseIdentityProviderInner {
    client: reqwest::Client,
    api_key: SecretString,
    identity_url: String,
    token_url: String,
}

impl std::fmt::Debug for FirebaseIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentityProvider")
            .field("identity_url", &self.inner.identity_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshForm<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

impl FirebaseIdentityProvider {
    /// Create a client authenticated with the project's web API key.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(FirebaseIdentityProviderInner {
                client,
                api_key,
                identity_url: IDENTITY_TOOLKIT_URL.to_owned(),
                token_url: SECURE_TOKEN_URL.to_owned(),
            }),
        }
    }

    /// `base` with the API key attached.
    fn endpoint(&self, base: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(base, &[("key", self.inner.api_key.expose_secret())])
            .map_err(|e| AuthError::Provider(format!("invalid endpoint {base}: {e}")))
    }

    /// Turn a non-success response into an [`AuthError`].
    async fn error_from(response: reqwest::Response) -> AuthError {
        let status = response.status();
        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => AuthError::from_code(&envelope.error.message),
            Err(_) => AuthError::Provider(format!("HTTP {status}")),
        }
    }

    /// POST a JSON body to `accounts:{method}`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = self.endpoint(&format!("{}/accounts:{method}", self.inner.identity_url))?;
        let response = self
            .inner
            .client
            .post(url)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn lookup(&self, id_token: &str) -> Result<AuthUser, AuthError> {
        let found: LookupResponse = self.call("lookup", &json!({ "idToken": id_token })).await?;
        let user = found
            .users
            .into_iter()
            .next()
            .ok_or(AuthError::SessionExpired)?;

        Ok(AuthUser {
            uid: UserId::new(user.local_id),
            email: user.email.as_deref().and_then(|e| Email::parse(e).ok()),
            email_verified: user.email_verified,
        })
    }

    async fn session_from(&self, signed_in: SignInResponse) -> Result<ProviderSession, AuthError> {
        let user = self.lookup(&signed_in.id_token).await?;
        Ok(ProviderSession {
            user,
            tokens: AuthTokens {
                id_token: signed_in.id_token,
                refresh_token: signed_in.refresh_token,
            },
        })
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let url = self.endpoint(&self.inner.token_url)?;
        let response = self
            .inner
            .client
            .post(url)
            .form(&RefreshForm {
                grant_type: "refresh_token",
                refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let refreshed: RefreshResponse = response.json().await?;
        Ok(AuthTokens {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    #[instrument(skip(self, password))]
    async fn register(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password,
            "returnSecureToken": true,
        });
        let signed_in: SignInResponse = self.call("signUp", &body).await?;
        self.session_from(signed_in).await
    }

    #[instrument(skip(self, password))]
    async fn login(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password,
            "returnSecureToken": true,
        });
        let signed_in: SignInResponse = self.call("signInWithPassword", &body).await?;
        self.session_from(signed_in).await
    }

    #[instrument(skip_all)]
    async fn send_verification_email(&self, tokens: &AuthTokens) -> Result<(), AuthError> {
        let body = json!({
            "requestType": "VERIFY_EMAIL",
            "idToken": tokens.id_token,
        });
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_sign_in_link(&self, email: &Email, continue_url: &str) -> Result<(), AuthError> {
        let body = json!({
            "requestType": "EMAIL_SIGNIN",
            "email": email.as_str(),
            "continueUrl": continue_url,
            "canHandleCodeInApp": true,
        });
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }

    #[instrument(skip(self, oob_code))]
    async fn complete_sign_in_link(
        &self,
        email: &Email,
        oob_code: &str,
    ) -> Result<ProviderSession, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "oobCode": oob_code,
        });
        let signed_in: SignInResponse = self.call("signInWithEmailLink", &body).await?;
        self.session_from(signed_in).await
    }

    #[instrument(skip(self, google_id_token))]
    async fn sign_in_with_google(
        &self,
        google_id_token: &str,
        request_uri: &str,
    ) -> Result<ProviderSession, AuthError> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", google_id_token)
            .append_pair("providerId", "google.com")
            .finish();
        let body = json!({
            "postBody": post_body,
            "requestUri": request_uri,
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let signed_in: SignInResponse = self.call("signInWithIdp", &body).await?;
        self.session_from(signed_in).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, tokens: &AuthTokens) -> Result<ProviderSession, AuthError> {
        match self.lookup(&tokens.id_token).await {
            Ok(user) => Ok(ProviderSession {
                user,
                tokens: tokens.clone(),
            }),
            // ID tokens live for an hour; swap the refresh token for a new one.
            Err(AuthError::SessionExpired) => {
                let tokens = self.exchange_refresh_token(&tokens.refresh_token).await?;
                let user = self.lookup(&tokens.id_token).await?;
                Ok(ProviderSession { user, tokens })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = FirebaseIdentityProvider::new(SecretString::from("AIzaSyQ4mV8kX2pL7wN"));
        let debug = format!("{provider:?}");
        assert!(!debug.contains("AIzaSyQ4mV8kX2pL7wN"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert!(matches!(
            AuthError::from_code(&envelope.error.message),
            AuthError::EmailExists
        ));
    }

    #[test]
    fn test_lookup_response_shape() {
        let body = r#"{"kind":"identitytoolkit#GetAccountInfoResponse","users":[{"localId":"uid-1","email":"asha@example.in","emailVerified":true}]}"#;
        let parsed: LookupResponse = serde_json::from_str(body).unwrap();
        let user = parsed.users.first().unwrap();
        assert_eq!(user.local_id, "uid-1");
        assert!(user.email_verified);
    }
}
