use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;

use super::error::OrderError;
use super::models::{CreateOrderRequest, Order, OrderStatus, RefundRequest, RescheduleRequest};

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

/// POST /api/orders - create an order
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::Validation(e.to_string()))?;

    let order = state.order_service.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders - list orders, optionally filtered by status
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, OrderError> {
    let orders = state.order_service.list_orders(query.status).await?;
    Ok(Json(orders))
}

/// GET /api/orders/:id - fetch one order
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, OrderError> {
    let order = state.order_service.get_order(id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/advance - move one step along the forward path
pub async fn advance_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, OrderError> {
    let order = state.order_service.advance(id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/reschedule - change or release the order's slot
pub async fn reschedule_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Order>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::Validation(e.to_string()))?;

    let order = state.order_service.reschedule(id, request).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/refund - refund and close the order
pub async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Order>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::Validation(e.to_string()))?;

    let order = state.order_service.refund(id, request).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/cancel - cancel the order
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, OrderError> {
    let order = state.order_service.cancel(id).await?;
    Ok(Json(order))
}
