//! Shipping carrier integration.
//!
//! Opens a shipment with the carrier for every order before the order is
//! stored. The carrier speaks plain JSON over HTTP with two endpoints: a login
//! exchange that returns a session token, and an order-create call that
//! returns the carrier's order and shipment identifiers.
//!
//! # Architecture
//!
//! - [`client`] - The [`CarrierApi`] seam and its `reqwest` implementation
//! - [`auth`] - Session tokens (static long-lived or obtained by login)
//! - [`payload`] - Carrier order payload and package dimensions
//! - [`gateway`] - Token caching and the single re-authentication retry
//!
//! # Retry policy
//!
//! A request rejected with an authentication status is retried exactly once
//! after a forced login that bypasses both the cached and the static token.
//! Any other failure, or a second rejection, is final.

pub mod auth;
pub mod client;
pub mod gateway;
pub mod payload;

use std::time::Duration;

use thiserror::Error;

pub use auth::{CarrierToken, TokenSource};
pub use client::{CarrierApi, CarrierResponse, HttpCarrierClient};
pub use gateway::{CarrierCredentials, FulfillmentGateway, GatewaySettings};
pub use payload::{PackageDefaults, PackageDimensions, PayloadItem, ShipmentPayload};

/// Errors from a single carrier HTTP exchange.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login was refused (invalid email/password).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The carrier answered with something we could not parse.
    #[error("Malformed carrier response: {0}")]
    Protocol(String),
}

/// Why a shipment could not be opened.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// No usable token: login failed, or the fresh token was rejected too.
    #[error("carrier authentication failed: {0}")]
    AuthFailed(String),

    /// The carrier refused the shipment (business rule or HTTP error).
    #[error("carrier rejected the shipment (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status of the carrier response.
        status: u16,
        /// Carrier-supplied explanation.
        message: String,
    },

    /// The carrier's response was not the JSON we expected.
    #[error("malformed carrier response: {0}")]
    Protocol(String),

    /// The carrier could not be reached.
    #[error("carrier unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The carrier did not answer in time.
    #[error("carrier call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<CarrierError> for FulfillmentError {
    fn from(err: CarrierError) -> Self {
        match err {
            CarrierError::Http(e) => Self::Transport(e),
            CarrierError::AuthenticationFailed(msg) => Self::AuthFailed(msg),
            CarrierError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error_display() {
        let err = FulfillmentError::Rejected {
            status: 200,
            message: "Wrong pickup location".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "carrier rejected the shipment (HTTP 200): Wrong pickup location"
        );
    }

    #[test]
    fn test_carrier_error_maps_to_fulfillment_error() {
        let err: FulfillmentError =
            CarrierError::AuthenticationFailed("Invalid credentials".to_string()).into();
        assert!(matches!(err, FulfillmentError::AuthFailed(ref m) if m == "Invalid credentials"));

        let err: FulfillmentError = CarrierError::Protocol("not json".to_string()).into();
        assert!(matches!(err, FulfillmentError::Protocol(_)));
    }

    #[test]
    fn test_timeout_error_display() {
        let err = FulfillmentError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "carrier call timed out after 30s");
    }
}
