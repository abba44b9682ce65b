//! Authentication route handlers.
//!
//! Handles registration, password login, passwordless email links, Google
//! sign-in and email verification against the configured auth provider.
//! Every successful sign-in lands in the session and in the session's
//! identity context, which then resolves the user's role.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use hapus_core::{Email, RegistrationForm, SessionView, ValidationError};

use crate::error::{AppError, Result};
use crate::middleware::CurrentViewer;
use crate::middleware::auth::{refresh_sign_in, sign_in, sign_out, signed_in_user};
use crate::middleware::auth_rate_limiter;
use crate::models::{SignedInUser, keys};
use crate::services::{AccountError, AccountService};
use crate::services::auth::ProviderSession;
use crate::state::AppState;

/// Path on the client that completes an email sign-in link.
const EMAIL_LINK_PAGE: &str = "/auth/email-link";

/// Auth routes, nested under `/api/auth`.
///
/// Everything that reaches the provider is rate limited when `rate_limited`.
pub fn router(rate_limited: bool) -> Router<AppState> {
    let provider_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/email-link", post(send_email_link))
        .route("/email-link/complete", post(complete_email_link))
        .route("/google", post(google))
        .route("/verify-email/resend", post(resend_verification))
        .route("/verify-email/check", post(check_verification));

    let provider_routes = if rate_limited {
        provider_routes.route_layer(auth_rate_limiter())
    } else {
        provider_routes
    };

    Router::new()
        .route("/session", get(current_session))
        .route("/logout", post(logout))
        .merge(provider_routes)
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Password login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sign-in link request body.
#[derive(Debug, Deserialize)]
pub struct EmailLinkRequest {
    #[serde(default)]
    pub email: String,
}

/// Completion of a sign-in link.
///
/// `email` is only needed when the link is opened in a different browser
/// session from the one that requested it.
#[derive(Debug, Deserialize)]
pub struct CompleteEmailLinkRequest {
    pub link: String,
    pub email: Option<String>,
}

/// Google sign-in body. A missing token means the prompt was closed.
#[derive(Debug, Deserialize)]
pub struct GoogleRequest {
    pub id_token: Option<String>,
}

/// Response to any auth action.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub session: SessionView,
}

/// Response to a verification check.
#[derive(Debug, Serialize)]
pub struct VerificationStatus {
    pub verified: bool,
    pub message: &'static str,
    pub session: SessionView,
}

/// Response when no sign-in happened.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub message: &'static str,
}

// =============================================================================
// Helpers
// =============================================================================

/// Store a provider session and wait briefly for the role to resolve.
async fn establish(
    session: &Session,
    state: &AppState,
    provider_session: ProviderSession,
) -> Result<SessionView> {
    let context = sign_in(session, state, SignedInUser::from(provider_session)).await?;
    Ok(context.ready(state.config().guard_wait).await)
}

/// The session's sign-in, or "Please log in again".
async fn require_signed_in(session: &Session) -> Result<SignedInUser> {
    signed_in_user(session)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Please log in again".to_string()))
}

fn client_url(state: &AppState, path: &str) -> String {
    format!("{}{path}", state.config().base_url.trim_end_matches('/'))
}

// =============================================================================
// Session
// =============================================================================

/// The current session view.
///
/// GET /api/auth/session
async fn current_session(State(state): State<AppState>, viewer: CurrentViewer) -> Json<SessionView> {
    Json(viewer.context.ready(state.config().guard_wait).await)
}

/// POST /api/auth/logout
#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, session: Session) -> Result<Json<AuthResponse>> {
    sign_out(&session, &state).await?;
    Ok(Json(AuthResponse {
        message: "Logged out successfully!",
        session: SessionView::signed_out(),
    }))
}

// =============================================================================
// Registration & Password Login
// =============================================================================

/// POST /api/auth/register
#[instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let provider_session = AccountService::new(state.provider(), state.store())
        .register(&form)
        .await?;
    let view = establish(&session, &state, provider_session).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Account created! Please verify your email.",
            session: view,
        }),
    ))
}

/// POST /api/auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let provider_session = AccountService::new(state.provider(), state.store())
        .login(&request.email, &request.password)
        .await?;
    let view = establish(&session, &state, provider_session).await?;

    Ok(Json(AuthResponse {
        message: "Login successful!",
        session: view,
    }))
}

// =============================================================================
// Email Link
// =============================================================================

/// Email a passwordless sign-in link.
///
/// POST /api/auth/email-link
#[instrument(skip_all)]
async fn send_email_link(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<EmailLinkRequest>,
) -> Result<Json<Notice>> {
    let email = AccountService::new(state.provider(), state.store())
        .send_sign_in_link(&request.email, &client_url(&state, EMAIL_LINK_PAGE))
        .await?;
    session
        .insert(keys::PENDING_LINK_EMAIL, email.as_str())
        .await?;

    Ok(Json(Notice {
        message: "Sign in link sent! Check your email.",
    }))
}

/// Finish signing in from a link.
///
/// POST /api/auth/email-link/complete
#[instrument(skip_all)]
async fn complete_email_link(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CompleteEmailLinkRequest>,
) -> Result<Json<AuthResponse>> {
    let pending = session.get::<String>(keys::PENDING_LINK_EMAIL).await?;
    let raw = request
        .email
        .filter(|email| !email.trim().is_empty())
        .or(pending)
        .ok_or(AccountError::MissingEmail)?;
    let email = Email::parse(&raw).map_err(|_| ValidationError::InvalidEmail)?;

    let provider_session = AccountService::new(state.provider(), state.store())
        .complete_sign_in_link(&email, &request.link)
        .await?;
    session.remove::<String>(keys::PENDING_LINK_EMAIL).await?;
    let view = establish(&session, &state, provider_session).await?;

    Ok(Json(AuthResponse {
        message: "Login successful!",
        session: view,
    }))
}

// =============================================================================
// Google
// =============================================================================

/// POST /api/auth/google
#[instrument(skip_all)]
async fn google(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<GoogleRequest>,
) -> Result<Json<AuthResponse>> {
    let provider_session = AccountService::new(state.provider(), state.store())
        .sign_in_with_google(request.id_token.as_deref(), &client_url(&state, "/"))
        .await?;
    let view = establish(&session, &state, provider_session).await?;

    Ok(Json(AuthResponse {
        message: "Login successful!",
        session: view,
    }))
}

// =============================================================================
// Email Verification
// =============================================================================

/// POST /api/auth/verify-email/resend
#[instrument(skip_all)]
async fn resend_verification(State(state): State<AppState>, session: Session) -> Result<Json<Notice>> {
    let signed_in = require_signed_in(&session).await?;
    AccountService::new(state.provider(), state.store())
        .resend_verification(&signed_in.tokens)
        .await?;

    Ok(Json(Notice {
        message: "Verification email sent! Check your inbox.",
    }))
}

/// Reload the session object and report whether the email is verified now.
///
/// POST /api/auth/verify-email/check
#[instrument(skip_all)]
async fn check_verification(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<VerificationStatus>> {
    let signed_in = require_signed_in(&session).await?;
    let refreshed = AccountService::new(state.provider(), state.store())
        .check_verification(&signed_in.tokens)
        .await?;

    let verified = refreshed.user.email_verified;
    let context = refresh_sign_in(&session, &state, SignedInUser::from(refreshed)).await?;
    let view = context.ready(state.config().guard_wait).await;

    Ok(Json(VerificationStatus {
        verified,
        message: if verified {
            "Email verified successfully!"
        } else {
            "Email not verified yet. Please check your inbox."
        },
        session: view,
    }))
}
