//! Account flows: registration, sign-in and email verification.
//!
//! These wrap the [`IdentityProvider`] and write the profile and role
//! documents that registration creates. Session bookkeeping (which user is
//! signed in, their tokens, a pending sign-in link) belongs to the routes.

use thiserror::Error;
use tracing::{info, instrument, warn};

use hapus_core::{Email, FormKind, RegistrationForm, RoleRecord, Timestamp, UserProfile, ValidationError};

use super::auth::{
    AuthError, AuthOperation, AuthTokens, IdentityProvider, ProviderSession, oob_code_from_link,
};
use crate::db::{RepositoryError, RoleRepository, UserRepository};
use crate::store::DocumentStore;

/// Errors from account flows.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Input rejected before reaching the provider.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The sign-in link form was submitted without an email.
    #[error("Please enter your email")]
    MissingEmail,

    /// The provider refused; `operation` selects the user-facing message.
    #[error("{operation:?} failed: {source}")]
    Auth {
        operation: AuthOperation,
        #[source]
        source: AuthError,
    },

    /// Writing the profile or role record failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AccountError {
    fn auth(operation: AuthOperation) -> impl FnOnce(AuthError) -> Self {
        move |source| Self::Auth { operation, source }
    }
}

/// Account operations over a borrowed provider and store.
pub struct AccountService<'a> {
    provider: &'a dyn IdentityProvider,
    store: &'a dyn DocumentStore,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(provider: &'a dyn IdentityProvider, store: &'a dyn DocumentStore) -> Self {
        Self { provider, store }
    }

    /// Create an account, its profile and role record, and send the
    /// verification email.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` before contacting the provider,
    /// `AccountError::Auth` if the provider refuses and
    /// `AccountError::Repository` if the documents cannot be written.
    #[instrument(skip_all)]
    pub async fn register(&self, form: &RegistrationForm) -> Result<ProviderSession, AccountError> {
        let account = form.validate()?;
        let session = self
            .provider
            .register(&account.email, &account.password)
            .await
            .map_err(AccountError::auth(AuthOperation::Register))?;
        let uid = session.user.uid.clone();

        let profile = UserProfile::from_account(uid.clone(), &account, Timestamp::now());
        UserRepository::new(self.store).put(&profile).await?;
        RoleRepository::new(self.store)
            .put(&uid, RoleRecord::NEW_USER)
            .await?;

        if let Err(err) = self.provider.send_verification_email(&session.tokens).await {
            warn!(user_id = %uid, error = %err, "verification email not sent");
        }
        info!(user_id = %uid, "account registered");
        Ok(session)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for blank fields or a malformed
    /// email, `AccountError::Auth` if the provider refuses.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<ProviderSession, AccountError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields(FormKind::Registration).into());
        }
        let email = Email::parse(email).map_err(|_| ValidationError::InvalidEmail)?;
        let session = self
            .provider
            .login(&email, password)
            .await
            .map_err(AccountError::auth(AuthOperation::Login))?;
        info!(user_id = %session.user.uid, "signed in with password");
        Ok(session)
    }

    /// Email a passwordless sign-in link and return the address it went to,
    /// for the caller to remember until the link is used.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::MissingEmail` for a blank address and
    /// `AccountError::Auth` if the provider refuses.
    #[instrument(skip_all)]
    pub async fn send_sign_in_link(
        &self,
        email: &str,
        continue_url: &str,
    ) -> Result<Email, AccountError> {
        if email.trim().is_empty() {
            return Err(AccountError::MissingEmail);
        }
        let email = Email::parse(email)
            .map_err(|_| AccountError::auth(AuthOperation::SendSignInLink)(AuthError::InvalidEmail))?;
        self.provider
            .send_sign_in_link(&email, continue_url)
            .await
            .map_err(AccountError::auth(AuthOperation::SendSignInLink))?;
        Ok(email)
    }

    /// Finish a passwordless sign-in from the link (or bare code) the user
    /// followed.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` when the link carries no code or the
    /// provider rejects it.
    #[instrument(skip_all)]
    pub async fn complete_sign_in_link(
        &self,
        email: &Email,
        link: &str,
    ) -> Result<ProviderSession, AccountError> {
        let fail = AccountError::auth(AuthOperation::CompleteSignInLink);
        let Some(code) = oob_code_from_link(link) else {
            return Err(fail(AuthError::InvalidLink));
        };
        let session = self
            .provider
            .complete_sign_in_link(email, &code)
            .await
            .map_err(fail)?;
        self.verify_quietly(&session).await;
        info!(user_id = %session.user.uid, "signed in with email link");
        Ok(session)
    }

    /// Sign in with a Google ID token. A missing token means the user closed
    /// the Google prompt.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` with `AuthError::Cancelled` for a missing
    /// token, or the provider's error.
    #[instrument(skip_all)]
    pub async fn sign_in_with_google(
        &self,
        google_id_token: Option<&str>,
        request_uri: &str,
    ) -> Result<ProviderSession, AccountError> {
        let fail = AccountError::auth(AuthOperation::Google);
        let Some(token) = google_id_token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(fail(AuthError::Cancelled));
        };
        let session = self
            .provider
            .sign_in_with_google(token, request_uri)
            .await
            .map_err(fail)?;
        self.verify_quietly(&session).await;
        info!(user_id = %session.user.uid, "signed in with Google");
        Ok(session)
    }

    /// Send the verification email again.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` if the provider refuses.
    pub async fn resend_verification(&self, tokens: &AuthTokens) -> Result<(), AccountError> {
        self.provider
            .send_verification_email(tokens)
            .await
            .map_err(AccountError::auth(AuthOperation::ResendVerification))
    }

    /// Reload the session object to see whether the email has been verified.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` if the tokens are no longer accepted.
    pub async fn check_verification(&self, tokens: &AuthTokens) -> Result<ProviderSession, AccountError> {
        self.provider
            .refresh(tokens)
            .await
            .map_err(AccountError::auth(AuthOperation::CheckVerification))
    }

    /// Send a verification email to an unverified user, ignoring failures.
    async fn verify_quietly(&self, session: &ProviderSession) {
        if session.user.email_verified {
            return;
        }
        if let Err(err) = self.provider.send_verification_email(&session.tokens).await {
            warn!(user_id = %session.user.uid, error = %err, "verification email not sent");
        }
    }
}
