//! Cart route handlers.
//!
//! The cart lives in the browser session. Every handler answers with the
//! whole cart so the client never has to recompute totals.

use axum::{
    Json, Router,
    extract::Path,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use hapus_core::{Cart, CartLine, Price, ProductId, catalog};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::keys;
use crate::state::AppState;

/// Cart routes, nested under `/api/cart`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/items", post(add))
        .route("/items/{product_id}", put(set_quantity).delete(remove))
}

// =============================================================================
// View Types
// =============================================================================

/// One cart line with its subtotal.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    #[serde(flatten)]
    pub line: CartLine,
    pub subtotal: Price,
}

/// The cart with derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_items: u32,
    pub total_price: Price,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartItemView {
                    subtotal: line.subtotal(),
                    line: line.clone(),
                })
                .collect(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
        }
    }
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

/// Quantity update request body. Zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// The cart stored in the session, or an empty one.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(keys::CART, cart).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/cart
async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// POST /api/cart/items
#[instrument(skip(session))]
async fn add(session: Session, Json(request): Json<AddItemRequest>) -> Result<Json<CartView>> {
    let product = catalog::find(&request.product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

    let mut cart = load_cart(&session).await?;
    cart.add(product);
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product.id.as_str())]),
    );
    Ok(Json(CartView::from(&cart)))
}

/// PUT /api/cart/items/{product_id}
#[instrument(skip(session))]
async fn set_quantity(
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.set_quantity(&product_id, request.quantity);
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// DELETE /api/cart/items/{product_id}
#[instrument(skip(session))]
async fn remove(session: Session, Path(product_id): Path<ProductId>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(&product_id);
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// DELETE /api/cart
async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_view_totals() {
        let mut cart = Cart::new();
        let royal = catalog::find(&ProductId::new("royal-hapus")).unwrap();
        cart.add(royal);
        cart.add(royal);

        let view = CartView::from(&cart);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_items, 2);
        assert_eq!(view.items[0].subtotal, Price::rupees(3600));
        assert_eq!(view.total_price, Price::rupees(3600));
    }

    #[test]
    fn test_cart_view_serializes_flat_lines() {
        let mut cart = Cart::new();
        cart.add(catalog::find(&ProductId::new("royal-hapus")).unwrap());

        let json = serde_json::to_value(CartView::from(&cart)).unwrap();
        assert_eq!(json["items"][0]["product_id"], "royal-hapus");
        assert_eq!(json["items"][0]["subtotal"], 1800);
        assert_eq!(json["total_items"], 1);
    }
}
