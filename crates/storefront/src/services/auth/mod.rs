//! Authentication provider boundary.
//!
//! The storefront does not own credentials. Registration, password and
//! passwordless sign-in, Google sign-in and email verification are delegated to
//! an [`IdentityProvider`]; what comes back is the provider's session object
//! ([`AuthUser`]) plus the tokens needed to act on the user's behalf later.
//!
//! # Providers
//!
//! - [`FirebaseIdentityProvider`] - Identity Toolkit and Secure Token REST APIs
//! - [`MemoryIdentityProvider`] - in-process accounts with argon2 hashes and an
//!   outbox instead of real email, for tests and local development
//!
//! Signing out is local to the browser session and never reaches the provider.

mod error;
mod firebase;
mod memory;

pub use error::{AuthError, AuthOperation};
pub use firebase::FirebaseIdentityProvider;
pub use memory::{MemoryIdentityProvider, OutboxMessage, OutboxMessageKind};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hapus_core::{AuthUser, Email};

/// Tokens issued by the provider for a signed-in user.
///
/// Kept in the server-side session only. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub id_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// A successful sign-in: the session object and its tokens.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub user: AuthUser,
    pub tokens: AuthTokens,
}

/// Operations the storefront consumes from the auth provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Create an email/password account and sign it in.
    async fn register(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError>;

    /// Sign in with email and password.
    async fn login(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError>;

    /// Email the signed-in user a verification link.
    async fn send_verification_email(&self, tokens: &AuthTokens) -> Result<(), AuthError>;

    /// Email a passwordless sign-in link that returns to `continue_url`.
    async fn send_sign_in_link(&self, email: &Email, continue_url: &str) -> Result<(), AuthError>;

    /// Finish a passwordless sign-in with the code from the link.
    async fn complete_sign_in_link(
        &self,
        email: &Email,
        oob_code: &str,
    ) -> Result<ProviderSession, AuthError>;

    /// Sign in with a Google ID token obtained by the browser.
    async fn sign_in_with_google(
        &self,
        google_id_token: &str,
        request_uri: &str,
    ) -> Result<ProviderSession, AuthError>;

    /// Reload the session object (e.g. to pick up a fresh `email_verified`).
    async fn refresh(&self, tokens: &AuthTokens) -> Result<ProviderSession, AuthError>;
}

/// Extract the one-time code from a sign-in link, or accept a bare code.
#[must_use]
pub fn oob_code_from_link(link_or_code: &str) -> Option<String> {
    let trimmed = link_or_code.trim();
    if trimmed.is_empty() {
        return None;
    }
    match url::Url::parse(trimmed) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "oobCode")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) => Some(trimmed.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oob_code_from_link() {
        assert_eq!(
            oob_code_from_link("https://hapus.example/auth?mode=signIn&oobCode=abc123&apiKey=k"),
            Some("abc123".to_owned())
        );
        assert_eq!(oob_code_from_link("abc123"), Some("abc123".to_owned()));
        assert_eq!(oob_code_from_link("https://hapus.example/auth?mode=signIn"), None);
        assert_eq!(oob_code_from_link("   "), None);
    }

    #[test]
    fn test_tokens_debug_redacted() {
        let tokens = AuthTokens {
            id_token: "eyJhbGciOi.secret".to_owned(),
            refresh_token: "AMf-refresh".to_owned(),
        };
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(!debug.contains("AMf-refresh"));
    }
}
