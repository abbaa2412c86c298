//! Lifecycle and classification enums.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │    └─► confirmed ──┘     ▲
///    │            └─────────────┘
///    └──────────────┴────────► cancelled
/// ```
///
/// Prepaid orders are created as `Confirmed`, deferred-payment orders as
/// `Pending`. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses whose line items still hold stock.
    ///
    /// Shipped and delivered quantities are already reflected in the product's
    /// stock total; cancelled quantities were released.
    pub const RESERVING: [Self; 3] = [Self::Pending, Self::Confirmed, Self::Processing];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether orders in this status count against available stock.
    #[must_use]
    pub const fn reserves_stock(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Confirmed | Self::Processing | Self::Cancelled
            ) | (
                Self::Confirmed,
                Self::Processing | Self::Shipped | Self::Cancelled
            ) | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// The snake_case name used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid on delivery; requires a fresh contact verification.
    Deferred,
    /// Paid up front through the payment gateway; requires a signed receipt.
    Prepaid,
}

impl PaymentMethod {
    /// Status a newly created order starts in.
    #[must_use]
    pub const fn initial_status(self) -> OrderStatus {
        match self {
            Self::Deferred => OrderStatus::Pending,
            Self::Prepaid => OrderStatus::Confirmed,
        }
    }

    /// Payment state a newly created order starts in.
    #[must_use]
    pub const fn initial_payment_state(self) -> PaymentState {
        match self {
            Self::Deferred => PaymentState::Pending,
            Self::Prepaid => PaymentState::Paid,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Prepaid => "prepaid",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether money has changed hands for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_state", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Paid,
    Refunded,
}

/// How a charge rule computes its contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.charge_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    /// A flat amount.
    Fixed,
    /// A rate applied to the cart subtotal, in percent.
    Percentage,
}
