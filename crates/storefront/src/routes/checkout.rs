//! Checkout endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::{Result, add_breadcrumb};
use crate::services::{OrderReceipt, OrderSubmission};
use crate::state::AppState;

/// Place an order. The response total is the server-computed one.
pub async fn submit(
    State(state): State<AppState>,
    Json(submission): Json<OrderSubmission>,
) -> Result<(StatusCode, Json<OrderReceipt>)> {
    add_breadcrumb(
        "checkout",
        "Order submitted",
        Some(&[("payment_method", submission.payment_method.as_str())]),
    );

    let receipt = state
        .pipeline()
        .orchestrator
        .submit_order(submission)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
