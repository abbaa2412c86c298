//! Order endpoints (admin).

use axum::{
    Json,
    extract::{Path, State},
};
use marigold_core::OrderId;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, StatusUpdate};
use crate::state::AppState;

/// Order detail.
pub async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = state
        .pipeline()
        .orders
        .get(OrderId::from_uuid(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}

/// Move an order to a new status.
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let target = update.target();
    let order = state
        .pipeline()
        .orders
        .update_status(OrderId::from_uuid(id), update)
        .await?;

    tracing::info!(order_id = %order.id, status = %target, "Order status updated");
    Ok(Json(order))
}
