use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::domain::{Category, CategoryId, Order, OrderId, OrderPayload, Product, ProductId};
use crate::StorefrontError;

type ApiResult<T> = Result<T, ApiError>;

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "storefront-orders"}))
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductFilter {
    category: Option<CategoryId>,
}

pub(super) async fn list_products(State(s): State<AppState>, Query(f): Query<ProductFilter>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(s.catalog.list_products(f.category).await?))
}

pub(super) async fn get_product(State(s): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<Product>> {
    s.catalog
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .map(Json)
        .ok_or_else(|| StorefrontError::NotFound(format!("Product {id}")).into())
}

pub(super) async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(s.catalog.list_categories().await?))
}

pub(super) async fn create_order(State(s): State<AppState>, Json(payload): Json<OrderPayload>) -> ApiResult<(StatusCode, Json<Value>)> {
    let order = s.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": order.id() }))))
}

pub(super) async fn list_orders(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.admin.list_orders(bearer(&headers)).await?))
}

pub(super) async fn get_order(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<OrderId>) -> ApiResult<Json<Order>> {
    Ok(Json(s.admin.get_order(bearer(&headers), id).await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusParams {
    status: String,
}

pub(super) async fn update_order_status(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<OrderId>,
    Query(p): Query<StatusParams>,
) -> ApiResult<Json<Order>> {
    Ok(Json(s.admin.set_status(bearer(&headers), id, &p.status).await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteParams {
    #[serde(default)]
    confirm: bool,
}

pub(super) async fn delete_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<OrderId>,
    Query(p): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    s.admin.delete_order(bearer(&headers), id, p.confirm).await?;
    Ok(StatusCode::NO_CONTENT)
}
