//! Contact verification endpoints.

use axum::{Json, extract::State};
use marigold_core::Phone;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub phone: Phone,
}

#[derive(Debug, Serialize)]
pub struct CodeRequested {
    pub sent: bool,
}

#[derive(Debug, Deserialize)]
pub struct CodeCheck {
    pub phone: Phone,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CodeChecked {
    pub verified: bool,
}

/// Send a one-time code to the buyer's phone.
pub async fn request_code(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Json<CodeRequested> {
    let sent = state.pipeline().gate.request_code(&request.phone).await;
    Json(CodeRequested { sent })
}

/// Check a one-time code. Failures answer 400 with a `reason`.
pub async fn check_code(
    State(state): State<AppState>,
    Json(check): Json<CodeCheck>,
) -> Result<Json<CodeChecked>> {
    state
        .pipeline()
        .gate
        .check_code(&check.phone, &check.code)
        .await?;
    Ok(Json(CodeChecked { verified: true }))
}
