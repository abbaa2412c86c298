//! HTTP route handlers for storefront.
//!
//! Handlers are thin: they decode the request, call one pipeline operation
//! and encode the result.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Database ping
//!
//! # Verification (rate limited)
//! POST /api/verification/request            - Send a one-time code
//! POST /api/verification/check              - Check a one-time code
//!
//! # Checkout (rate limited)
//! POST /api/checkout                        - Place an order
//!
//! # Inventory
//! GET  /api/products/{id}/stock             - Stock snapshot
//! GET  /api/products/{id}/availability      - Can `?quantity=N` be bought
//!
//! # Admin (bearer token)
//! GET  /api/orders/{id}                     - Order detail
//! POST /api/admin/orders/{id}/status        - Status transition
//! PUT  /api/admin/products/{id}/stock       - Set stock total
//! ```

pub mod checkout;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod verification;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{checkout_rate_limiter, verification_rate_limiter};
use crate::state::AppState;

/// Create the verification routes router.
pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/request", post(verification::request_code))
        .route("/check", post(verification::check_code))
}

/// Create the product inventory routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}/stock", get(inventory::stock))
        .route("/{id}/availability", get(inventory::availability))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/products/{id}/stock", put(inventory::set_stock))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest(
            "/api/verification",
            verification_routes().layer(verification_rate_limiter()),
        )
        .nest(
            "/api/checkout",
            Router::new()
                .route("/", post(checkout::submit))
                .layer(checkout_rate_limiter()),
        )
        .nest("/api/products", product_routes())
        .route("/api/orders/{id}", get(orders::show))
        .nest("/api/admin", admin_routes())
}
