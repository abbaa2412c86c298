//! Marigold storefront library.
//!
//! The order pipeline (verification, pricing, inventory, fulfillment,
//! persistence and notification) and the HTTP handlers that drive it.
//! Exposed as a library so the binary, the CLI and the integration tests
//! share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carrier;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
