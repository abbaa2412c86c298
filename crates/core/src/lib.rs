//! Marigold Core - Shared types library.
//!
//! This crate provides the domain types used across all Marigold components:
//! - `storefront` - Order pipeline and the HTTP handlers that drive it
//! - `cli` - Command-line tools for migrations, charge rules and stock
//! - `integration-tests` - Cross-component pipeline tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, contact channels, money helpers and lifecycle statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
