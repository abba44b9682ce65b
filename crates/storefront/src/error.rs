//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error bodies are JSON: `{"error": "<message>"}`. Messages are the short
//! user-facing texts the storefront shows; internal details are only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use hapus_core::ValidationError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::{AccountError, OrderError, RoleError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Form input rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Account flow failed.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Order workflow failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Role management failed.
    #[error("Role error: {0}")]
    Role(#[from] RoleError),

    /// Server-side session could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// An admin action failed; `message` is what the console shows.
    #[error("{message}: {source}")]
    Action {
        message: &'static str,
        #[source]
        source: Box<AppError>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Replace the user-facing message, keeping the status and the cause.
    #[must_use]
    pub fn with_message(self, message: &'static str) -> Self {
        Self::Action {
            message,
            source: Box::new(self),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Account(err) => match err {
                AccountError::Validation(_) | AccountError::MissingEmail => StatusCode::BAD_REQUEST,
                AccountError::Auth { source, .. } => auth_status(source),
                AccountError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Role(err) => match err {
                RoleError::SelfRevocation(_) => StatusCode::BAD_REQUEST,
                RoleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Action { source, .. } => source.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show to the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Validation(err) => err.to_string(),
            Self::Account(err) => match err {
                AccountError::Validation(v) => v.to_string(),
                AccountError::MissingEmail => err.to_string(),
                AccountError::Auth { operation, source } => source.user_message(*operation).to_string(),
                AccountError::Repository(_) => "Registration failed".to_string(),
            },
            Self::Order(err) => match err {
                OrderError::Validation(v) => v.to_string(),
                OrderError::NotFound(_) => "Order not found".to_string(),
                OrderError::Repository(_) => "Internal server error".to_string(),
            },
            Self::Role(err) => match err {
                RoleError::SelfRevocation(_) => err.to_string(),
                RoleError::Repository(_) => "Failed to update user".to_string(),
            },
            Self::Action { message, .. } => (*message).to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(message) => message.clone(),
        }
    }
}

const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::EmailExists => StatusCode::CONFLICT,
        AuthError::UserDisabled => StatusCode::FORBIDDEN,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AuthError::InvalidEmail
        | AuthError::WeakPassword
        | AuthError::InvalidLink
        | AuthError::Cancelled => StatusCode::BAD_REQUEST,
        AuthError::Provider(_) | AuthError::Http(_) => StatusCode::BAD_GATEWAY,
        AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "royal-hapus")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
