//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON: `{"error": "...", "reason": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{InventoryError, SubmitError, VerificationError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout was refused or failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] SubmitError),

    /// A verification code check failed.
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => Self::NotFound(format!("product {id}")),
            InventoryError::Repository(e) => Self::Database(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl AppError {
    /// Whether this error indicates a server-side fault worth reporting.
    const fn is_server_fault(&self) -> bool {
        match self {
            Self::Database(e) => !matches!(
                e,
                RepositoryError::NotFound
                    | RepositoryError::Validation(_)
                    | RepositoryError::Conflict(_)
                    | RepositoryError::InvalidTransition(_)
            ),
            Self::Checkout(e) => matches!(
                e,
                SubmitError::PricingUnavailable(_)
                    | SubmitError::Fulfillment { .. }
                    | SubmitError::Persistence { .. }
            ),
            Self::Internal(_) => true,
            Self::Verification(_)
            | Self::NotFound(_)
            | Self::Unauthorized(_)
            | Self::BadRequest(_) => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(e) => match e {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Validation(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Conflict(_) | RepositoryError::InvalidTransition(_) => {
                    StatusCode::CONFLICT
                }
                RepositoryError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(e) => match e {
                SubmitError::InvalidCart(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SubmitError::Unverified => StatusCode::FORBIDDEN,
                SubmitError::PaymentInvalid => StatusCode::PAYMENT_REQUIRED,
                SubmitError::PricingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                // Indistinguishable to the buyer.
                SubmitError::Fulfillment { .. } | SubmitError::Persistence { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Verification(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients
    fn body(&self) -> ErrorBody {
        let (error, reason) = match self {
            Self::Database(e) => match e {
                RepositoryError::NotFound => ("Not found".to_string(), None),
                RepositoryError::Validation(msg) | RepositoryError::Conflict(msg) => {
                    (msg.clone(), None)
                }
                RepositoryError::InvalidTransition(t) => (t.to_string(), None),
                _ => ("Internal server error".to_string(), None),
            },
            Self::Checkout(e) => (e.user_message(), Some(checkout_reason(e))),
            Self::Verification(e) => (e.to_string(), Some(e.reason())),
            Self::Internal(_) => ("Internal server error".to_string(), None),
            Self::NotFound(_) | Self::Unauthorized(_) | Self::BadRequest(_) => {
                (self.to_string(), None)
            }
        };
        ErrorBody { error, reason }
    }
}

const fn checkout_reason(err: &SubmitError) -> &'static str {
    match err {
        SubmitError::InvalidCart(_) => "invalid_cart",
        SubmitError::Unverified => "unverified",
        SubmitError::PaymentInvalid => "payment_invalid",
        SubmitError::PricingUnavailable(_) => "pricing_unavailable",
        SubmitError::Fulfillment { .. } | SubmitError::Persistence { .. } => "order_failed",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for pipeline steps.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
