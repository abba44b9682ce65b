//! Authentication middleware and extractors.
//!
//! Every browser session is tied to a [`SessionContext`] through an id kept in
//! the session. The extractors here resolve that context and apply the route
//! guard policies to it:
//!
//! - [`CurrentViewer`] - any visitor, signed in or not
//! - [`RequireAuth`] - checkout and order history
//! - [`RequireAdmin`] - the admin console
//!
//! A guard that finds the session still loading waits for it (bounded by
//! `guard_wait`) before deciding. Redirect decisions are answered with a JSON
//! body naming where the client should go, plus a `Location` header.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use hapus_core::{AuthUser, DenialTracker, GuardDecision, GuardPolicy, RedirectTarget, SessionView};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{SignedInUser, keys};
use crate::services::SessionContext;
use crate::state::AppState;

/// Seconds a client should wait before retrying a loading session.
const RETRY_AFTER_SECONDS: &str = "1";

// =============================================================================
// Session context helpers
// =============================================================================

/// The identity context of this browser session, created on first use.
///
/// A context that was evicted (or never existed in this process) is rebuilt
/// from the sign-in stored in the session.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be read or written.
pub async fn session_context(session: &Session, state: &AppState) -> Result<SessionContext, AppError> {
    let id = match session.get::<Uuid>(keys::IDENTITY_ID).await? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            session.insert(keys::IDENTITY_ID, id).await?;
            id
        }
    };

    let (context, fresh) = state.sessions().get_or_create(id).await;
    if fresh && let Some(signed_in) = session.get::<SignedInUser>(keys::SIGNED_IN_USER).await? {
        tracing::debug!(user_id = %signed_in.user.uid, "restoring identity context");
        context.set_user(Some(signed_in.user)).await;
    }
    Ok(context)
}

/// Record a successful sign-in in the session and its identity context.
///
/// The session id is cycled so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be modified.
pub async fn sign_in(
    session: &Session,
    state: &AppState,
    signed_in: SignedInUser,
) -> Result<SessionContext, AppError> {
    session.cycle_id().await?;
    session.insert(keys::SIGNED_IN_USER, &signed_in).await?;
    session.remove::<DenialTracker>(keys::DENIALS).await?;

    set_sentry_user(&signed_in.user.uid, signed_in.user.email.as_ref().map(hapus_core::Email::as_str));
    let context = session_context(session, state).await?;
    context.set_user(Some(signed_in.user)).await;
    Ok(context)
}

/// Replace the stored session object after a refresh (e.g. the email was
/// just verified).
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be modified.
pub async fn refresh_sign_in(
    session: &Session,
    state: &AppState,
    signed_in: SignedInUser,
) -> Result<SessionContext, AppError> {
    session.insert(keys::SIGNED_IN_USER, &signed_in).await?;
    let context = session_context(session, state).await?;
    context.set_user(Some(signed_in.user)).await;
    Ok(context)
}

/// Sign out of this browser session. The cart is kept.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be modified.
pub async fn sign_out(session: &Session, state: &AppState) -> Result<(), AppError> {
    session.remove::<SignedInUser>(keys::SIGNED_IN_USER).await?;
    session.remove::<String>(keys::PENDING_LINK_EMAIL).await?;
    session.remove::<DenialTracker>(keys::DENIALS).await?;
    if let Some(id) = session.remove::<Uuid>(keys::IDENTITY_ID).await?
        && let Some(context) = state.sessions().remove(id).await
    {
        context.set_user(None).await;
    }
    clear_sentry_user();
    Ok(())
}

/// The sign-in stored in the session, if any.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be read.
pub async fn signed_in_user(session: &Session) -> Result<Option<SignedInUser>, AppError> {
    Ok(session.get::<SignedInUser>(keys::SIGNED_IN_USER).await?)
}

fn session_from(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor for the current visitor's identity, signed in or not.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(viewer: CurrentViewer) -> Json<SessionView> {
///     Json(viewer.context.view())
/// }
/// ```
pub struct CurrentViewer {
    pub session: Session,
    pub context: SessionContext,
}

impl FromRequestParts<AppState> for CurrentViewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let context = session_context(&session, state).await?;
        Ok(Self { session, context })
    }
}

/// Extractor that requires a signed-in, verified, unsuspended user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.uid)
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, state, GuardPolicy::Authenticated).await.map(Self)
    }
}

/// Extractor that additionally requires the admin role.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        guard(parts, state, GuardPolicy::Admin).await.map(Self)
    }
}

/// Client route a request is for: API paths map onto the page they serve.
fn requested_page(path: &str) -> &str {
    path.strip_prefix("/api")
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(path)
}

async fn guard(parts: &Parts, state: &AppState, policy: GuardPolicy) -> Result<AuthUser, GuardRejection> {
    let session = session_from(parts)?;
    let context = session_context(&session, state).await?;
    let view = context.ready(state.config().guard_wait).await;

    let decision = policy.evaluate(&view, requested_page(parts.uri.path()));
    let denial = match &decision {
        GuardDecision::Redirect(redirect) => Some(redirect.denial),
        GuardDecision::Wait | GuardDecision::Render => None,
    };

    let mut tracker = session
        .get::<DenialTracker>(keys::DENIALS)
        .await
        .map_err(AppError::from)?
        .unwrap_or_default();
    let fresh = tracker.observe(denial);
    session
        .insert(keys::DENIALS, &tracker)
        .await
        .map_err(AppError::from)?;

    match decision {
        GuardDecision::Render => view.user.ok_or_else(|| {
            GuardRejection::Error(AppError::Internal("guard rendered without a user".to_string()))
        }),
        GuardDecision::Wait => {
            tracing::warn!(?policy, "session still loading after guard wait");
            Err(GuardRejection::Loading)
        }
        GuardDecision::Redirect(redirect) => {
            tracing::debug!(?policy, denial = ?redirect.denial, "guard redirect");
            Err(GuardRejection::Redirect {
                target: redirect.target,
                from: redirect.from,
                notice: fresh.map(|denial| denial.message(policy)),
            })
        }
    }
}

/// Why a guarded request was not served.
#[derive(Debug)]
pub enum GuardRejection {
    /// The role is still resolving; try again shortly.
    Loading,
    /// Go somewhere else first. `notice` is set only the first time a denial
    /// is observed.
    Redirect {
        target: RedirectTarget,
        from: Option<String>,
        notice: Option<&'static str>,
    },
    /// The session itself failed.
    Error(AppError),
}

impl From<AppError> for GuardRejection {
    fn from(err: AppError) -> Self {
        Self::Error(err)
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Loading => {
                let mut response = (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Session is still loading" })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECONDS));
                response
            }
            Self::Redirect {
                target,
                from,
                notice,
            } => {
                let status = match target {
                    RedirectTarget::SignIn => StatusCode::UNAUTHORIZED,
                    RedirectTarget::Home | RedirectTarget::VerifyEmail => StatusCode::FORBIDDEN,
                };
                let mut response = (
                    status,
                    Json(json!({
                        "redirect": target.path(),
                        "from": from,
                        "notice": notice,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::LOCATION, HeaderValue::from_static(target.path()));
                response
            }
            Self::Error(err) => err.into_response(),
        }
    }
}

/// The view for this session, waiting briefly for a loading role.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be read.
pub async fn settled_view(session: &Session, state: &AppState) -> Result<SessionView, AppError> {
    let context = session_context(session, state).await?;
    Ok(context.ready(state.config().guard_wait).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use hapus_core::{Email, UserId};

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::services::auth::MemoryIdentityProvider;
    use crate::store::MemoryStore;

    fn test_state() -> AppState {
        AppState::with_backends(
            StorefrontConfig::in_memory(""),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentityProvider::new()),
        )
    }

    fn test_session() -> Session {
        Session::new(None, Arc::new(tower_sessions::MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_sign_out_drops_identity_context() {
        let state = test_state();
        let session = test_session();

        let context = session_context(&session, &state).await.unwrap();
        context
            .set_user(Some(AuthUser {
                uid: UserId::new("u1"),
                email: Some(Email::parse("asha@example.in").unwrap()),
                email_verified: true,
            }))
            .await;
        let id = session.get::<Uuid>(keys::IDENTITY_ID).await.unwrap().unwrap();

        sign_out(&session, &state).await.unwrap();

        assert!(context.view().user.is_none());
        assert!(session.get::<Uuid>(keys::IDENTITY_ID).await.unwrap().is_none());
        let (_, fresh) = state.sessions().get_or_create(id).await;
        assert!(fresh);

        // The next request starts from a new, signed-out context.
        let next = session_context(&session, &state).await.unwrap();
        assert!(next.view().user.is_none());
    }

    #[test]
    fn test_requested_page_strips_api_prefix() {
        assert_eq!(requested_page("/api/checkout"), "/checkout");
        assert_eq!(requested_page("/api/admin/orders"), "/admin/orders");
        assert_eq!(requested_page("/orders"), "/orders");
        assert_eq!(requested_page("/apiary"), "/apiary");
    }

    #[test]
    fn test_redirect_rejection_response() {
        let response = GuardRejection::Redirect {
            target: RedirectTarget::SignIn,
            from: Some("/checkout".to_string()),
            notice: Some("Please log in to continue"),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::LOCATION], "/auth");

        let response = GuardRejection::Redirect {
            target: RedirectTarget::Home,
            from: None,
            notice: None,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_loading_rejection_sets_retry_after() {
        let response = GuardRejection::Loading.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
