//! Orders and the cart lines they are built from.
//!
//! An order is stored as one document: line items, applied charges and
//! fulfillment identifiers are embedded so the order can be read back
//! without joins.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marigold_core::{
    Email, MAX_AMOUNT, OrderId, OrderStatus, PaymentMethod, PaymentState, Phone, ProductId,
    round_money,
};

use super::AppliedCharge;

/// Most lines a single cart may carry.
pub const MAX_CART_LINES: usize = 100;

/// Selected product variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// A cart line.
///
/// Owned by the shopper's session until checkout; once embedded in an order
/// it is an immutable snapshot of what was bought and at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    /// Unit price when the line was added to the cart.
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub image: Option<String>,
}

impl LineItem {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Problems with a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("cart has more than {MAX_CART_LINES} lines")]
    TooManyLines,
    #[error("product {0} has a zero quantity")]
    ZeroQuantity(ProductId),
    #[error("product {0} has a negative price")]
    NegativePrice(ProductId),
    #[error("product {0} has no name")]
    MissingName(ProductId),
    #[error("order amount exceeds {MAX_AMOUNT}")]
    AmountTooLarge,
}

/// Recompute the subtotal from the cart's own lines.
///
/// # Errors
///
/// Returns a `CartError` if the cart is empty, oversized, or holds a line
/// with a zero quantity, negative price, or blank name, or if the subtotal
/// exceeds [`MAX_AMOUNT`].
pub fn subtotal(lines: &[LineItem]) -> Result<Decimal, CartError> {
    if lines.is_empty() {
        return Err(CartError::Empty);
    }
    if lines.len() > MAX_CART_LINES {
        return Err(CartError::TooManyLines);
    }

    let mut total = Decimal::ZERO;
    for line in lines {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity(line.product_id));
        }
        if line.unit_price.is_sign_negative() {
            return Err(CartError::NegativePrice(line.product_id));
        }
        if line.name.trim().is_empty() {
            return Err(CartError::MissingName(line.product_id));
        }
        total = line
            .line_total()
            .and_then(|amount| total.checked_add(amount))
            .filter(|amount| *amount <= MAX_AMOUNT)
            .ok_or(CartError::AmountTooLarge)?;
    }

    Ok(round_money(total))
}

/// The person placing the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: Email,
    /// Contact channel used for verification.
    pub phone: Phone,
}

impl Buyer {
    /// Split the full name into first name and the rest.
    #[must_use]
    pub fn split_name(&self) -> (&str, &str) {
        let trimmed = self.name.trim();
        trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(first, rest)| (first, rest.trim()))
    }
}

/// Where the parcel goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Carrier-side identifiers for an order's shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentInfo {
    pub carrier: String,
    pub carrier_order_id: Option<String>,
    pub shipment_id: Option<String>,
    /// Status string the carrier reported when the shipment was opened.
    pub carrier_status: Option<String>,
    pub opened_at: DateTime<Utc>,
}

/// Everything known about an order before the carrier is contacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub id: OrderId,
    pub buyer: Buyer,
    pub shipping_address: ShippingAddress,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub charges: Vec<AppliedCharge>,
    pub additional_amount: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    /// Gateway payment ID for prepaid orders.
    pub payment_reference: Option<String>,
    /// Free-form audit data (pricing degradation, client hints, ...).
    pub metadata: serde_json::Value,
}

/// When each lifecycle transition happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub processing_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    /// Record the moment the order entered `status`.
    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        match status {
            OrderStatus::Pending => {}
            OrderStatus::Confirmed => self.confirmed_at = Some(at),
            OrderStatus::Processing => self.processing_at = Some(at),
            OrderStatus::Shipped => self.shipped_at = Some(at),
            OrderStatus::Delivered => self.delivered_at = Some(at),
            OrderStatus::Cancelled => self.cancelled_at = Some(at),
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: Buyer,
    pub shipping_address: ShippingAddress,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub charges: Vec<AppliedCharge>,
    pub additional_amount: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_state: PaymentState,
    pub payment_reference: Option<String>,
    pub fulfillment: FulfillmentInfo,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub cancellation_reason: Option<String>,
    pub timestamps: StatusTimestamps,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the stored order from a draft whose shipment has been opened.
    #[must_use]
    pub fn from_draft(draft: OrderDraft, fulfillment: FulfillmentInfo, now: DateTime<Utc>) -> Self {
        let status = draft.payment_method.initial_status();
        let mut timestamps = StatusTimestamps::default();
        timestamps.stamp(status, now);

        Self {
            id: draft.id,
            buyer: draft.buyer,
            shipping_address: draft.shipping_address,
            line_items: draft.line_items,
            subtotal: draft.subtotal,
            charges: draft.charges,
            additional_amount: draft.additional_amount,
            total: draft.total,
            payment_method: draft.payment_method,
            payment_state: draft.payment_method.initial_payment_state(),
            payment_reference: draft.payment_reference,
            fulfillment,
            status,
            tracking_number: None,
            carrier_name: None,
            cancellation_reason: None,
            timestamps,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Units of `product` held by this order's lines.
    #[must_use]
    pub fn quantity_of(&self, product: ProductId) -> u64 {
        self.line_items
            .iter()
            .filter(|line| line.product_id == product)
            .map(|line| u64::from(line.quantity))
            .sum()
    }
}

/// A rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move an order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },
    #[error("{0} is required for this status")]
    MissingField(&'static str),
}

/// A requested lifecycle transition with its status-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusUpdate {
    Confirmed,
    Processing,
    Shipped {
        tracking_number: String,
        carrier: String,
    },
    Delivered,
    Cancelled {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl StatusUpdate {
    /// The status this update moves the order into.
    #[must_use]
    pub const fn target(&self) -> OrderStatus {
        match self {
            Self::Confirmed => OrderStatus::Confirmed,
            Self::Processing => OrderStatus::Processing,
            Self::Shipped { .. } => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Delivered,
            Self::Cancelled { .. } => OrderStatus::Cancelled,
        }
    }

    /// Apply this update to `order`, stamping the transition time.
    ///
    /// The order is left untouched when the update is rejected.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::NotAllowed` when the lifecycle forbids the
    /// move, or `TransitionError::MissingField` when a shipped update lacks
    /// its tracking details.
    pub fn apply(self, order: &mut Order, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let to = self.target();
        if !order.status.can_transition_to(to) {
            return Err(TransitionError::NotAllowed {
                from: order.status,
                to,
            });
        }

        match self {
            Self::Shipped {
                tracking_number,
                carrier,
            } => {
                if tracking_number.trim().is_empty() {
                    return Err(TransitionError::MissingField("tracking_number"));
                }
                if carrier.trim().is_empty() {
                    return Err(TransitionError::MissingField("carrier"));
                }
                order.tracking_number = Some(tracking_number.trim().to_string());
                order.carrier_name = Some(carrier.trim().to_string());
            }
            Self::Delivered => {
                // Deferred payments are collected on the doorstep.
                if order.payment_state == PaymentState::Pending {
                    order.payment_state = PaymentState::Paid;
                }
            }
            Self::Cancelled { reason } => {
                order.cancellation_reason = reason.filter(|r| !r.trim().is_empty());
            }
            Self::Confirmed | Self::Processing => {}
        }

        order.status = to;
        order.timestamps.stamp(to, now);
        order.updated_at = now;
        Ok(())
    }
}
