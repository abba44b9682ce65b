//! Checkout route handlers.
//!
//! Checkout turns the session cart into a pending order owned by the signed-in
//! customer. The cart is cleared only after the order is stored.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use hapus_core::{AuthUser, CheckoutForm, OrderId, RedirectTarget};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{GuardRejection, RequireAuth};
use crate::routes::cart::{CartView, load_cart, save_cart};
use crate::services::{OrderError, OrderService};
use crate::state::AppState;

/// Checkout routes, nested under `/api/checkout`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(summary).post(place_order))
}

/// What the checkout page shows before the form is submitted.
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub cart: CartView,
    /// Address the order confirmation is associated with.
    pub email: Option<String>,
}

/// Response to a placed order.
#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    /// Short reference shown to the customer.
    pub reference: String,
    pub message: &'static str,
}

/// GET /api/checkout
async fn summary(RequireAuth(user): RequireAuth, session: Session) -> Result<Json<CheckoutSummary>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CheckoutSummary {
        cart: CartView::from(&cart),
        email: user.email.map(hapus_core::Email::into_inner),
    }))
}

/// Signed-out visitors get a checkout-specific notice.
fn checkout_rejection(rejection: GuardRejection) -> GuardRejection {
    match rejection {
        GuardRejection::Redirect {
            target: RedirectTarget::SignIn,
            from,
            notice: Some(_),
        } => GuardRejection::Redirect {
            target: RedirectTarget::SignIn,
            from,
            notice: Some("Please log in to place an order."),
        },
        other => other,
    }
}

/// POST /api/checkout
#[instrument(skip_all)]
async fn place_order(
    State(state): State<AppState>,
    auth: std::result::Result<RequireAuth, GuardRejection>,
    session: Session,
    Json(form): Json<CheckoutForm>,
) -> std::result::Result<(StatusCode, Json<OrderPlaced>), GuardRejection> {
    let RequireAuth(user) = auth.map_err(checkout_rejection)?;
    let order_id = submit(&state, &user, &session, &form).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlaced {
            reference: order_id.short_ref(),
            order_id,
            message: "Your order is pending. Admin will confirm shortly.",
        }),
    ))
}

async fn submit(
    state: &AppState,
    user: &AuthUser,
    session: &Session,
    form: &CheckoutForm,
) -> Result<OrderId> {
    let mut cart = load_cart(session).await?;

    let order_id = OrderService::new(state.store())
        .place_order(user, &cart, form)
        .await
        .map_err(|err| match err {
            OrderError::Repository(_) => {
                AppError::from(err).with_message("Failed to place order. Please try again.")
            }
            other => AppError::from(other),
        })?;

    cart.clear();
    save_cart(session, &cart).await?;

    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    Ok(order_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_out_checkout_notice() {
        let rejection = checkout_rejection(GuardRejection::Redirect {
            target: RedirectTarget::SignIn,
            from: Some("/checkout".to_string()),
            notice: Some("Please log in to continue"),
        });
        match rejection {
            GuardRejection::Redirect { notice, from, .. } => {
                assert_eq!(notice, Some("Please log in to place an order."));
                assert_eq!(from.as_deref(), Some("/checkout"));
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_denial_stays_silent() {
        let rejection = checkout_rejection(GuardRejection::Redirect {
            target: RedirectTarget::SignIn,
            from: None,
            notice: None,
        });
        assert!(matches!(
            rejection,
            GuardRejection::Redirect { notice: None, .. }
        ));
    }
}
