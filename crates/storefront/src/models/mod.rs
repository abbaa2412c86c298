//! Domain models for the order pipeline.
//!
//! - [`order`] - Cart lines, buyer details, orders and status updates
//! - [`charge`] - Charge rules and the charges they produce

pub mod charge;
pub mod order;

pub use charge::{AppliedCharge, ChargeRule, ChargeRuleError, NewChargeRule};
pub use order::{
    Buyer, CartError, FulfillmentInfo, LineItem, Order, OrderDraft, ShippingAddress,
    StatusTimestamps, StatusUpdate, TransitionError, Variant, subtotal,
};
