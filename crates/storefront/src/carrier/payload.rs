//! Carrier order payload.

use chrono::{DateTime, Utc};
use marigold_core::PaymentMethod;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{LineItem, OrderDraft};

/// Parcel size assumptions for carrier bookings.
///
/// Products ship in a standard mailer; height grows by one layer for every
/// started group of `units_per_layer` units.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDefaults {
    /// Centimetres.
    pub length: Decimal,
    /// Centimetres.
    pub breadth: Decimal,
    /// Centimetres per layer.
    pub layer_height: Decimal,
    pub units_per_layer: u32,
    /// Kilograms per unit.
    pub unit_weight: Decimal,
}

impl Default for PackageDefaults {
    fn default() -> Self {
        Self {
            length: Decimal::from(10),
            breadth: Decimal::from(10),
            layer_height: Decimal::from(5),
            units_per_layer: 3,
            unit_weight: Decimal::new(5, 1),
        }
    }
}

/// Computed parcel size for one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageDimensions {
    pub length: Decimal,
    pub breadth: Decimal,
    pub height: Decimal,
    pub weight: Decimal,
}

impl PackageDefaults {
    /// Parcel dimensions for `units` items.
    #[must_use]
    pub fn dimensions(&self, units: u32) -> PackageDimensions {
        let units = units.max(1);
        let layers = units.div_ceil(self.units_per_layer.max(1));
        PackageDimensions {
            length: self.length,
            breadth: self.breadth,
            height: self.layer_height * Decimal::from(layers),
            weight: self.unit_weight * Decimal::from(units),
        }
    }
}

/// One line of the carrier order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub selling_price: Decimal,
}

/// Body of the carrier's order-create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentPayload {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<PayloadItem>,
    pub payment_method: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_charges: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sub_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub length: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub breadth: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub height: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
}

/// Stock keeping unit sent to the carrier: product id plus variant.
#[must_use]
pub fn sku(line: &LineItem) -> String {
    let mut sku = format!("P{}", line.product_id);
    for part in [&line.variant.size, &line.variant.color].into_iter().flatten() {
        let part = part.trim();
        if !part.is_empty() {
            sku.push('-');
            sku.push_str(&part.to_uppercase().replace(char::is_whitespace, "-"));
        }
    }
    sku
}

const fn carrier_payment_method(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Deferred => "COD",
        PaymentMethod::Prepaid => "Prepaid",
    }
}

impl ShipmentPayload {
    /// Build the carrier order for a priced draft.
    #[must_use]
    pub fn build(
        draft: &OrderDraft,
        pickup_location: &str,
        package: &PackageDefaults,
        now: DateTime<Utc>,
    ) -> Self {
        let (first_name, last_name) = draft.buyer.split_name();
        let units = draft
            .line_items
            .iter()
            .fold(0_u32, |n, l| n.saturating_add(l.quantity));
        let parcel = package.dimensions(units);
        let address = &draft.shipping_address;

        Self {
            order_id: draft.id.to_string(),
            order_date: now.format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: pickup_location.to_string(),
            billing_customer_name: first_name.to_string(),
            billing_last_name: last_name.to_string(),
            billing_address: address.line1.clone(),
            billing_address_2: address.line2.clone().unwrap_or_default(),
            billing_city: address.city.clone(),
            billing_pincode: address.postal_code.clone(),
            billing_state: address.state.clone(),
            billing_country: address.country.clone(),
            billing_email: draft.buyer.email.as_str().to_string(),
            billing_phone: draft.buyer.phone.national().to_string(),
            shipping_is_billing: true,
            order_items: draft
                .line_items
                .iter()
                .map(|line| PayloadItem {
                    name: line.name.clone(),
                    sku: sku(line),
                    units: line.quantity,
                    selling_price: line.unit_price,
                })
                .collect(),
            payment_method: carrier_payment_method(draft.payment_method),
            shipping_charges: draft.additional_amount,
            sub_total: draft.total,
            length: parcel.length,
            breadth: parcel.breadth,
            height: parcel.height,
            weight: parcel.weight,
        }
    }
}
