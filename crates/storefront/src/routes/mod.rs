//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness check
//! GET    /health/ready                    - Readiness check
//!
//! # Catalog
//! GET    /api/catalog                     - All products
//! GET    /api/catalog/{id}                - One product
//!
//! # Cart (session)
//! GET    /api/cart                        - Cart with totals
//! DELETE /api/cart                        - Clear cart
//! POST   /api/cart/items                  - Add one unit {product_id}
//! PUT    /api/cart/items/{product_id}     - Set quantity {quantity}
//! DELETE /api/cart/items/{product_id}     - Remove line
//!
//! # Checkout (requires auth)
//! GET    /api/checkout                    - Checkout summary
//! POST   /api/checkout                    - Place order
//!
//! # Orders (requires auth)
//! GET    /api/orders                      - My orders, newest first
//! GET    /api/orders/events               - SSE feed of my orders
//!
//! # Admin console (requires admin)
//! GET    /api/admin/orders                - Recent orders by status
//! GET    /api/admin/orders/events         - SSE feed of recent orders
//! POST   /api/admin/orders/{id}/confirm   - Confirm order
//! POST   /api/admin/orders/{id}/reject    - Reject order
//! POST   /api/admin/orders/{id}/messages  - Message the customer
//! GET    /api/admin/users                 - Users with roles
//! POST   /api/admin/users/{uid}/{action}  - promote | demote | suspend | unsuspend
//!
//! # Auth
//! GET    /api/auth/session                - Current session view
//! POST   /api/auth/register               - Create account
//! POST   /api/auth/login                  - Password login
//! POST   /api/auth/logout                 - Sign out
//! POST   /api/auth/email-link             - Send sign-in link
//! POST   /api/auth/email-link/complete    - Complete sign-in link
//! POST   /api/auth/google                 - Google sign-in
//! POST   /api/auth/verify-email/resend    - Resend verification email
//! POST   /api/auth/verify-email/check     - Refresh verification status
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

use axum::{Json, Router, http::StatusCode, http::Uri, response::IntoResponse};
use serde_json::json;

use crate::config::StorefrontConfig;
use crate::state::AppState;

/// Build the main routes router.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .nest("/api/catalog", catalog::router())
        .nest("/api/cart", cart::router())
        .nest("/api/checkout", checkout::router())
        .nest("/api/orders", orders::router())
        .nest("/api/admin", admin::router())
        .nest("/api/auth", auth::router(config.auth_rate_limit))
        .fallback(not_found)
}

/// JSON 404 for unknown paths.
async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Page not found", "path": uri.path() })),
    )
}
