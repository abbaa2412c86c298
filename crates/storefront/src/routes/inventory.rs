//! Stock and availability endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use marigold_core::ProductId;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::{Availability, StockSnapshot};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub total: i64,
}

/// Current stock view for a product.
pub async fn stock(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<StockSnapshot>> {
    let snapshot = state
        .pipeline()
        .inventory
        .available_stock(ProductId::new(id))
        .await?;
    Ok(Json(snapshot))
}

/// Whether `quantity` units can be bought right now.
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>> {
    let availability = state
        .pipeline()
        .inventory
        .check_availability(ProductId::new(id), query.quantity)
        .await?;
    Ok(Json(availability))
}

/// Overwrite a product's stock total. Takes effect on the next read.
pub async fn set_stock(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<StockUpdate>,
) -> Result<StatusCode> {
    if update.total < 0 {
        return Err(AppError::BadRequest("total cannot be negative".to_string()));
    }

    state
        .pipeline()
        .stock
        .set_total_stock(ProductId::new(id), update.total)
        .await?;

    tracing::info!(product_id = id, total = update.total, "Stock total updated");
    Ok(StatusCode::NO_CONTENT)
}
