//! Core types for Marigold.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod status;

pub use contact::{ContactError, Email, Phone};
pub use id::*;
pub use money::{MAX_AMOUNT, percent_of, round_money};
pub use status::*;
