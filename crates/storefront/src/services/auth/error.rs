//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
///
/// Provider error codes are folded into a handful of variants; anything not
/// recognised is kept verbatim in [`AuthError::Provider`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, or no account with that email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already in use")]
    EmailExists,

    /// The provider rejected the email address.
    #[error("invalid email")]
    InvalidEmail,

    /// The provider rejected the password.
    #[error("weak password")]
    WeakPassword,

    /// Sign-in link code was wrong, used or expired.
    #[error("invalid or expired sign-in link")]
    InvalidLink,

    /// The account has been disabled at the provider.
    #[error("user disabled")]
    UserDisabled,

    /// Provider throttling.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// Stored tokens are no longer accepted; the user has to sign in again.
    #[error("session expired")]
    SessionExpired,

    /// The user abandoned federated sign-in.
    #[error("sign in cancelled")]
    Cancelled,

    /// Unrecognised provider error code.
    #[error("provider error: {0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

/// The user action an [`AuthError`] came from, for picking its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    Login,
    Register,
    SendSignInLink,
    CompleteSignInLink,
    Google,
    ResendVerification,
    CheckVerification,
}

impl AuthError {
    /// Classify a provider error code.
    ///
    /// Codes may carry a detail suffix (`WEAK_PASSWORD : Password should be
    /// at least 6 characters`); only the leading code is matched.
    #[must_use]
    pub fn from_code(raw: &str) -> Self {
        let code = raw.split(':').next().unwrap_or(raw).trim();
        match code {
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
                Self::InvalidCredentials
            }
            "EMAIL_EXISTS" => Self::EmailExists,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" => Self::InvalidLink,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
                Self::SessionExpired
            }
            "INVALID_IDP_RESPONSE" => Self::InvalidCredentials,
            "USER_CANCELLED" => Self::Cancelled,
            _ => Self::Provider(code.to_owned()),
        }
    }

    /// Message shown to the user for this error during `operation`.
    ///
    /// Each operation recognises at most one specific condition and falls
    /// back to a generic failure message otherwise.
    #[must_use]
    pub const fn user_message(&self, operation: AuthOperation) -> &'static str {
        match (operation, self) {
            (AuthOperation::Login, Self::InvalidCredentials) => "Invalid email or password",
            (AuthOperation::Login, _) => "Login failed",
            (AuthOperation::Register, Self::EmailExists) => "Email already in use",
            (AuthOperation::Register, _) => "Registration failed",
            (AuthOperation::SendSignInLink, Self::InvalidEmail) => "Invalid email",
            (AuthOperation::SendSignInLink, _) => "Failed to send link",
            (AuthOperation::CompleteSignInLink, _) => "Sign in failed",
            (AuthOperation::Google, Self::Cancelled) => "Sign in cancelled",
            (AuthOperation::Google, _) => "Google sign in failed",
            (AuthOperation::ResendVerification, _) => {
                "Failed to resend email. Try again in a moment."
            }
            (AuthOperation::CheckVerification, Self::SessionExpired) => "Please log in again",
            (AuthOperation::CheckVerification, _) => "Something went wrong",
        }
    }

    /// Whether the failure is attributable to the caller's input rather than
    /// to the provider or the network.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Provider(_) | Self::Http(_) | Self::PasswordHash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_strips_detail() {
        assert!(matches!(
            AuthError::from_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        ));
        assert!(matches!(AuthError::from_code("EMAIL_EXISTS"), AuthError::EmailExists));
        assert!(matches!(
            AuthError::from_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_code("OPERATION_NOT_ALLOWED"),
            AuthError::Provider(code) if code == "OPERATION_NOT_ALLOWED"
        ));
    }

    #[test]
    fn test_login_messages() {
        assert_eq!(
            AuthError::InvalidCredentials.user_message(AuthOperation::Login),
            "Invalid email or password"
        );
        assert_eq!(AuthError::UserDisabled.user_message(AuthOperation::Login), "Login failed");
    }

    #[test]
    fn test_register_messages() {
        assert_eq!(
            AuthError::EmailExists.user_message(AuthOperation::Register),
            "Email already in use"
        );
        assert_eq!(
            AuthError::WeakPassword.user_message(AuthOperation::Register),
            "Registration failed"
        );
    }

    #[test]
    fn test_link_and_google_messages() {
        assert_eq!(
            AuthError::InvalidEmail.user_message(AuthOperation::SendSignInLink),
            "Invalid email"
        );
        assert_eq!(
            AuthError::TooManyAttempts.user_message(AuthOperation::SendSignInLink),
            "Failed to send link"
        );
        assert_eq!(AuthError::Cancelled.user_message(AuthOperation::Google), "Sign in cancelled");
        assert_eq!(
            AuthError::InvalidCredentials.user_message(AuthOperation::Google),
            "Google sign in failed"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AuthError::EmailExists.is_client_error());
        assert!(!AuthError::Provider("INTERNAL".to_owned()).is_client_error());
        assert!(!AuthError::PasswordHash.is_client_error());
    }
}
