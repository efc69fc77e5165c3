//! REST surface.

pub mod error;
mod handlers;

pub use error::ApiError;

use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::orders::{OrderAdmin, OrderService};
use crate::storage::CatalogReader;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogReader>,
    pub orders: Arc<OrderService>,
    pub admin: Arc<OrderAdmin>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/:id", get(handlers::get_product))
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/orders", post(handlers::create_order))
        .route("/api/admin/orders", get(handlers::list_orders))
        .route("/api/admin/orders/:id", get(handlers::get_order).delete(handlers::delete_order))
        .route("/api/admin/orders/:id/status", put(handlers::update_order_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
