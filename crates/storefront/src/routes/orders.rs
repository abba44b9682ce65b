//! Customer order history.
//!
//! Orders are filtered by owner in the store query, never client-side.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive};
use axum::{
    Json, Router,
    extract::State,
    response::Sse,
    routing::get,
};
use futures::{Stream, StreamExt};
use serde::Serialize;

use hapus_core::Order;

use crate::db::{OrderRepository, user_orders_from_snapshot};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::OrderService;
use crate::state::AppState;

/// Order routes, nested under `/api/orders`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/events", get(events))
}

/// Error event payload sent when a live feed fails.
#[derive(Debug, Serialize)]
pub struct FeedError {
    pub error: &'static str,
}

/// Serialize `payload` as a named SSE event.
pub(crate) fn json_event(name: &'static str, payload: &impl Serialize) -> Event {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| {
        r#"{"error":"Failed to serialize event"}"#.to_string()
    });
    Event::default().event(name).data(json)
}

/// GET /api/orders
async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.store())
        .for_user(&user.uid)
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to load orders"))?;
    Ok(Json(orders))
}

/// Live view of the signed-in customer's orders.
///
/// GET /api/orders/events
///
/// Sends an `orders` event with the full list, newest first, on connect and
/// after every change.
async fn events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let subscription = OrderRepository::new(state.store())
        .watch_for_user(&user.uid)
        .await
        .map_err(|err| AppError::from(err).with_message("Failed to load orders"))?;

    let uid = user.uid;
    let stream = subscription.map(move |item| {
        Ok(match item {
            Ok(snapshot) => {
                json_event("orders", &user_orders_from_snapshot(snapshot, &uid))
            }
            Err(err) => {
                tracing::warn!(user_id = %uid, error = %err, "order feed failed");
                json_event("error", &FeedError {
                    error: "Failed to load orders",
                })
            }
        })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
