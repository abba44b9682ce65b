//! Admin console route handlers.
//!
//! Every route requires an effective admin role. Order status changes and
//! messages are plain writes; the live feed picks them up.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::Sse,
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use hapus_core::{OrderBuckets, OrderId, OrderMessage, RoleAction, RoleRecord, SenderRole, UserId};

use crate::db::{ADMIN_WINDOW, OrderRepository, orders_from_snapshot};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::routes::orders::{FeedError, json_event};
use crate::services::{DirectoryEntry, OrderError, OrderService, RoleService};
use crate::state::AppState;

/// Admin routes, nested under `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders))
        .route("/orders/events", get(order_events))
        .route("/orders/{id}/confirm", post(confirm))
        .route("/orders/{id}/reject", post(reject))
        .route("/orders/{id}/messages", post(send_message))
        .route("/users", get(users))
        .route("/users/{uid}/{action}", post(update_role))
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Result of a status change.
#[derive(Debug, Serialize)]
pub struct StatusChanged {
    pub order_id: OrderId,
    pub message: &'static str,
}

/// Message composer body.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Result of sending a message: the order's whole thread.
#[derive(Debug, Serialize)]
pub struct MessageSent {
    pub messages: Vec<OrderMessage>,
    pub message: &'static str,
}

/// Result of a role action.
#[derive(Debug, Serialize)]
pub struct RoleUpdated {
    pub uid: UserId,
    pub role: RoleRecord,
    pub message: &'static str,
}

/// Notice shown after a role action succeeds.
const fn role_notice(action: RoleAction) -> &'static str {
    match action {
        RoleAction::Promote => "Made admin",
        RoleAction::Demote => "Removed admin access",
        RoleAction::Suspend => "User suspended",
        RoleAction::Unsuspend => "User unsuspended",
    }
}

// =============================================================================
// Orders
// =============================================================================

/// The 50 most recent orders, by status.
///
/// GET /api/admin/orders
async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<OrderBuckets>> {
    let buckets = OrderService::new(state.store())
        .recent_for_admin()
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to load orders"))?;
    Ok(Json(buckets))
}

/// Live view of the 50 most recent orders, by status.
///
/// GET /api/admin/orders/events
async fn order_events(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let subscription = OrderRepository::new(state.store())
        .watch_recent(ADMIN_WINDOW)
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to load orders"))?;

    let stream = subscription.map(|item| {
        Ok(match item {
            Ok(snapshot) => json_event(
                "orders",
                &OrderBuckets::partition(orders_from_snapshot(snapshot)),
            ),
            Err(err) => {
                tracing::warn!(error = %err, "admin order feed failed");
                json_event("error", &FeedError {
                    error: "Failed to load orders",
                })
            }
        })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/admin/orders/{id}/confirm
#[instrument(skip_all, fields(admin = %admin.uid))]
async fn confirm(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<StatusChanged>> {
    OrderService::new(state.store())
        .confirm(&id)
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to confirm order"))?;

    add_breadcrumb("admin", "Order confirmed", Some(&[("order_id", id.as_str())]));
    Ok(Json(StatusChanged {
        order_id: id,
        message: "Order confirmed!",
    }))
}

/// POST /api/admin/orders/{id}/reject
#[instrument(skip_all, fields(admin = %admin.uid))]
async fn reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<StatusChanged>> {
    OrderService::new(state.store())
        .reject(&id)
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to reject order"))?;

    add_breadcrumb("admin", "Order rejected", Some(&[("order_id", id.as_str())]));
    Ok(Json(StatusChanged {
        order_id: id,
        message: "Order rejected!",
    }))
}

/// POST /api/admin/orders/{id}/messages
///
/// A blank message is refused before anything is read.
#[instrument(skip_all, fields(admin = %admin.uid))]
async fn send_message(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageSent>> {
    let messages = OrderService::new(state.store())
        .append_message(&id, SenderRole::Admin, &request.message)
        .await
        .map_err(|err| match err {
            OrderError::Validation(_) => AppError::from(err),
            other => AppError::from(other).with_message("Failed to send message"),
        })?;

    Ok(Json(MessageSent {
        messages,
        message: "Message sent!",
    }))
}

// =============================================================================
// Users
// =============================================================================

/// Every known user with stored and effective roles.
///
/// GET /api/admin/users
async fn users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<DirectoryEntry>>> {
    let entries = RoleService::new(state.store())
        .directory(state.admin_emails())
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to load users"))?;
    Ok(Json(entries))
}

/// POST /api/admin/users/{uid}/{action}
#[instrument(skip_all, fields(admin = %admin.uid))]
async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((uid, action)): Path<(UserId, String)>,
) -> Result<Json<RoleUpdated>> {
    let action: RoleAction = action
        .parse()
        .map_err(|_| AppError::NotFound(format!("role action {action}")))?;

    let role = RoleService::new(state.store())
        .apply(&admin, &uid, action)
        .await?;

    add_breadcrumb(
        "admin",
        "Role updated",
        Some(&[("user_id", uid.as_str()), ("action", action.as_str())]),
    );
    Ok(Json(RoleUpdated {
        uid,
        role,
        message: role_notice(action),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_notices() {
        assert_eq!(role_notice(RoleAction::Promote), "Made admin");
        assert_eq!(role_notice(RoleAction::Demote), "Removed admin access");
        assert_eq!(role_notice(RoleAction::Suspend), "User suspended");
        assert_eq!(role_notice(RoleAction::Unsuspend), "User unsuspended");
    }
}
