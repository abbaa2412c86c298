//! Order submission.
//!
//! [`OrderOrchestrator::submit_order`] runs the checkout steps strictly in
//! sequence:
//!
//! 1. Verification: a fresh contact verification for cash-on-delivery, an
//!    authentic payment signature for prepaid.
//! 2. Pricing: subtotal from the line items, charges from the rule store.
//! 3. Order id generation, before any external call.
//! 4. Carrier shipment. Any failure aborts; no order is written.
//! 5. Order write, embedding the carrier identifiers.
//! 6. Confirmation notification on a background task.
//!
//! A stored order therefore always has a shipment. The converse does not
//! hold: a write failure after step 4 leaves a shipment (and, for prepaid
//! orders, a captured payment) with no order. That case is logged as
//! critical for manual reconciliation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marigold_core::{OrderId, OrderStatus, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::notifications::{NotificationDispatcher, NotificationTemplate, Recipient};
use super::pricing::{PriceQuote, PricingEngine, PricingError};
use super::verification::{PaymentProof, VerificationGate};
use crate::carrier::{FulfillmentError, FulfillmentGateway};
use crate::db::{OrderStore, RepositoryError};
use crate::models::{Buyer, CartError, LineItem, Order, OrderDraft, ShippingAddress, subtotal};

/// Shown to the buyer when an order fails after verification and pricing.
pub const SUPPORT_MESSAGE: &str = "We could not complete your order. Please contact support.";

/// A checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSubmission {
    pub line_items: Vec<LineItem>,
    pub buyer: Buyer,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Required for prepaid orders.
    #[serde(default)]
    pub payment_proof: Option<PaymentProof>,
    /// The total the client displayed. Recorded for audit, never used.
    #[serde(default)]
    pub client_total: Option<Decimal>,
}

/// Returned to the buyer after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub reference: String,
    pub total: Decimal,
    pub status: OrderStatus,
}

/// Why a checkout was refused.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid cart: {0}")]
    InvalidCart(#[from] CartError),

    #[error("buyer has no recent contact verification")]
    Unverified,

    #[error("payment confirmation is missing or not authentic")]
    PaymentInvalid,

    #[error("pricing unavailable: {0}")]
    PricingUnavailable(#[source] PricingError),

    #[error("fulfillment failed for order {order_id}: {source}")]
    Fulfillment {
        order_id: OrderId,
        #[source]
        source: FulfillmentError,
        /// A captured payment must be refunded by hand.
        refund_required: bool,
    },

    #[error("order {order_id} could not be stored: {source}")]
    Persistence {
        order_id: OrderId,
        #[source]
        source: RepositoryError,
        refund_required: bool,
    },
}

impl SubmitError {
    /// Message safe to show the buyer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCart(e) => format!("Your cart could not be processed: {e}."),
            Self::Unverified => {
                "Please verify your phone number before placing a cash-on-delivery order."
                    .to_string()
            }
            Self::PaymentInvalid => {
                "We could not confirm your payment. If you were charged, please contact support."
                    .to_string()
            }
            Self::PricingUnavailable(_) => {
                "Checkout is temporarily unavailable. Please try again shortly.".to_string()
            }
            Self::Fulfillment { .. } | Self::Persistence { .. } => SUPPORT_MESSAGE.to_string(),
        }
    }

    /// Whether the buyer may have paid for an order that does not exist.
    #[must_use]
    pub const fn refund_required(&self) -> bool {
        match self {
            Self::Fulfillment {
                refund_required, ..
            }
            | Self::Persistence {
                refund_required, ..
            } => *refund_required,
            _ => false,
        }
    }
}

/// Sequences verification, pricing, fulfillment, storage and notification.
pub struct OrderOrchestrator {
    gate: Arc<VerificationGate>,
    pricing: Arc<PricingEngine>,
    fulfillment: Arc<FulfillmentGateway>,
    orders: Arc<dyn OrderStore>,
    notifications: NotificationDispatcher,
    store_timeout: Duration,
}

impl OrderOrchestrator {
    #[must_use]
    pub fn new(
        gate: Arc<VerificationGate>,
        pricing: Arc<PricingEngine>,
        fulfillment: Arc<FulfillmentGateway>,
        orders: Arc<dyn OrderStore>,
        notifications: NotificationDispatcher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            pricing,
            fulfillment,
            orders,
            notifications,
            store_timeout,
        }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// See [`SubmitError`]. Nothing is stored unless this returns `Ok`.
    #[instrument(skip_all, fields(method = %submission.payment_method))]
    pub async fn submit_order(
        &self,
        submission: OrderSubmission,
    ) -> Result<OrderReceipt, SubmitError> {
        let OrderSubmission {
            line_items,
            buyer,
            shipping_address,
            payment_method,
            payment_proof,
            client_total,
        } = submission;

        let payment_proof = self
            .verify(payment_method, &buyer, payment_proof)
            .await?;

        let subtotal = subtotal(&line_items)?;
        let quote = self
            .pricing
            .quote(subtotal)
            .await
            .map_err(|e| match e {
                PricingError::AmountTooLarge => SubmitError::InvalidCart(CartError::AmountTooLarge),
                e @ PricingError::Unavailable(_) => SubmitError::PricingUnavailable(e),
            })?;

        if let Some(claimed) = client_total
            && claimed != quote.total
        {
            warn!(%claimed, computed = %quote.total, "Ignoring client-supplied total");
        }

        let order_id = OrderId::generate();
        let refund_required = payment_method == PaymentMethod::Prepaid;
        let draft = build_draft(
            order_id,
            buyer,
            shipping_address,
            line_items,
            &quote,
            payment_method,
            payment_proof.as_ref(),
            client_total,
        );

        let fulfillment = match self.fulfillment.create_shipment(&draft).await {
            Ok(info) => info,
            Err(source) => {
                error!(
                    %order_id,
                    error = %source,
                    refund_required,
                    payment_id = payment_proof.as_ref().map(|p| p.gateway_payment_id.as_str()),
                    "Shipment could not be opened, order aborted"
                );
                return Err(SubmitError::Fulfillment {
                    order_id,
                    source,
                    refund_required,
                });
            }
        };

        let mut order = Order::from_draft(draft, fulfillment, Utc::now());
        if let Some(metadata) = order.metadata.as_object_mut() {
            metadata.insert(
                "carrier_order_id".to_string(),
                serde_json::json!(order.fulfillment.carrier_order_id),
            );
            metadata.insert(
                "shipment_id".to_string(),
                serde_json::json!(order.fulfillment.shipment_id),
            );
        }

        let stored = match self.store(&order).await {
            Ok(stored) => stored,
            Err(source) => {
                error!(
                    critical = true,
                    %order_id,
                    carrier = %order.fulfillment.carrier,
                    carrier_order_id = order.fulfillment.carrier_order_id.as_deref(),
                    shipment_id = order.fulfillment.shipment_id.as_deref(),
                    refund_required,
                    payment_id = order.payment_reference.as_deref(),
                    error = %source,
                    "Shipment opened but order not stored; reconcile manually"
                );
                return Err(SubmitError::Persistence {
                    order_id,
                    source,
                    refund_required,
                });
            }
        };

        info!(%order_id, total = %stored.total, "Order placed");

        self.notifications.dispatch(
            NotificationTemplate::OrderConfirmation,
            Recipient::Email(stored.buyer.email.clone()),
            confirmation_data(&stored),
        );

        Ok(OrderReceipt {
            order_id,
            reference: order_id.reference(),
            total: stored.total,
            status: stored.status,
        })
    }

    async fn verify(
        &self,
        method: PaymentMethod,
        buyer: &Buyer,
        proof: Option<PaymentProof>,
    ) -> Result<Option<PaymentProof>, SubmitError> {
        match method {
            PaymentMethod::Deferred => {
                if self.gate.is_recently_verified(&buyer.phone).await {
                    Ok(None)
                } else {
                    Err(SubmitError::Unverified)
                }
            }
            PaymentMethod::Prepaid => match proof {
                Some(proof) if self.gate.verify_payment(&proof) => Ok(Some(proof)),
                _ => Err(SubmitError::PaymentInvalid),
            },
        }
    }

    async fn store(&self, order: &Order) -> Result<Order, RepositoryError> {
        match tokio::time::timeout(self.store_timeout, self.orders.create(order)).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Timeout(self.store_timeout)),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_draft(
    id: OrderId,
    buyer: Buyer,
    shipping_address: ShippingAddress,
    line_items: Vec<LineItem>,
    quote: &PriceQuote,
    payment_method: PaymentMethod,
    payment_proof: Option<&PaymentProof>,
    client_total: Option<Decimal>,
) -> OrderDraft {
    let mut metadata = serde_json::Map::new();
    if quote.degraded {
        metadata.insert("pricing_degraded".to_string(), serde_json::json!(true));
    }
    if let Some(claimed) = client_total {
        metadata.insert("client_total".to_string(), serde_json::json!(claimed));
    }
    if let Some(proof) = payment_proof {
        metadata.insert(
            "gateway_order_id".to_string(),
            serde_json::json!(proof.gateway_order_id),
        );
    }

    OrderDraft {
        id,
        buyer,
        shipping_address,
        line_items,
        subtotal: quote.subtotal,
        charges: quote.charges.clone(),
        additional_amount: quote.additional_amount,
        total: quote.total,
        payment_method,
        payment_reference: payment_proof.map(|p| p.gateway_payment_id.clone()),
        metadata: serde_json::Value::Object(metadata),
    }
}

fn confirmation_data(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "order_id": order.id,
        "reference": order.id.reference(),
        "name": order.buyer.name,
        "total": order.total,
        "payment_method": order.payment_method,
        "items": order
            .line_items
            .iter()
            .map(|line| serde_json::json!({
                "name": line.name,
                "quantity": line.quantity,
                "unit_price": line.unit_price,
            }))
            .collect::<Vec<_>>(),
    })
}
