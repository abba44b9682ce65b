//! Catalog route handlers.
//!
//! The catalog is compiled in, so these handlers never touch the store.

use axum::{Json, Router, extract::Path, routing::get};

use hapus_core::{Product, ProductId, catalog};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Catalog routes, nested under `/api/catalog`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(show))
}

/// List every product.
///
/// GET /api/catalog
async fn index() -> Json<&'static [Product]> {
    Json(catalog::all())
}

/// One product.
///
/// GET /api/catalog/{id}
async fn show(Path(id): Path<ProductId>) -> Result<Json<&'static Product>> {
    catalog::find(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
