//! Order repository for database operations.
//!
//! Orders are written once as a complete document and afterwards only touched
//! by status transitions. Line items, charges and fulfillment identifiers are
//! JSONB columns on the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use marigold_core::{OrderId, OrderStatus, PaymentMethod, PaymentState, ProductId};

use super::{OrderStore, RepositoryError, map_unique_violation};
use crate::models::{
    AppliedCharge, Buyer, FulfillmentInfo, LineItem, Order, ShippingAddress, StatusTimestamps,
    StatusUpdate,
};

const ORDER_COLUMNS: &str = r"
    id, buyer, shipping_address, line_items, subtotal, charges,
    additional_amount, total, payment_method, payment_state, payment_reference,
    fulfillment, status, tracking_number, carrier_name, cancellation_reason,
    confirmed_at, processing_at, shipped_at, delivered_at, cancelled_at,
    metadata, created_at, updated_at
";

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer: Json<Buyer>,
    shipping_address: Json<ShippingAddress>,
    line_items: Json<Vec<LineItem>>,
    subtotal: Decimal,
    charges: Json<Vec<AppliedCharge>>,
    additional_amount: Decimal,
    total: Decimal,
    payment_method: PaymentMethod,
    payment_state: PaymentState,
    payment_reference: Option<String>,
    fulfillment: Json<FulfillmentInfo>,
    status: OrderStatus,
    tracking_number: Option<String>,
    carrier_name: Option<String>,
    cancellation_reason: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    processing_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    metadata: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::from_uuid(row.id),
            buyer: row.buyer.0,
            shipping_address: row.shipping_address.0,
            line_items: row.line_items.0,
            subtotal: row.subtotal,
            charges: row.charges.0,
            additional_amount: row.additional_amount,
            total: row.total,
            payment_method: row.payment_method,
            payment_state: row.payment_state,
            payment_reference: row.payment_reference,
            fulfillment: row.fulfillment.0,
            status: row.status,
            tracking_number: row.tracking_number,
            carrier_name: row.carrier_name,
            cancellation_reason: row.cancellation_reason,
            timestamps: StatusTimestamps {
                confirmed_at: row.confirmed_at,
                processing_at: row.processing_at,
                shipped_at: row.shipped_at,
                delivered_at: row.delivered_at,
                cancelled_at: row.cancelled_at,
            },
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for order database operations.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO storefront.order (
                id, buyer, shipping_address, line_items, subtotal, charges,
                additional_amount, total, payment_method, payment_state, payment_reference,
                fulfillment, status, tracking_number, carrier_name, cancellation_reason,
                confirmed_at, processing_at, shipped_at, delivered_at, cancelled_at,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            RETURNING {ORDER_COLUMNS}
            "
        );

        let row: OrderRow = sqlx::query_as(&sql)
            .bind(order.id.as_uuid())
            .bind(Json(&order.buyer))
            .bind(Json(&order.shipping_address))
            .bind(Json(&order.line_items))
            .bind(order.subtotal)
            .bind(Json(&order.charges))
            .bind(order.additional_amount)
            .bind(order.total)
            .bind(order.payment_method)
            .bind(order.payment_state)
            .bind(order.payment_reference.as_deref())
            .bind(Json(&order.fulfillment))
            .bind(order.status)
            .bind(order.tracking_number.as_deref())
            .bind(order.carrier_name.as_deref())
            .bind(order.cancellation_reason.as_deref())
            .bind(order.timestamps.confirmed_at)
            .bind(order.timestamps.processing_at)
            .bind(order.timestamps.shipped_at)
            .bind(order.timestamps.delivered_at)
            .bind(order.timestamps.cancelled_at)
            .bind(Json(&order.metadata))
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "order"))?;

        Ok(row.into())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1");

        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn update_status(
        &self,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent transitions are serialized.
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 FOR UPDATE");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

        let mut order: Order = row.ok_or(RepositoryError::NotFound)?.into();
        update.apply(&mut order, Utc::now())?;

        sqlx::query(
            r"
            UPDATE storefront.order
            SET status = $2,
                payment_state = $3,
                tracking_number = $4,
                carrier_name = $5,
                cancellation_reason = $6,
                confirmed_at = $7,
                processing_at = $8,
                shipped_at = $9,
                delivered_at = $10,
                cancelled_at = $11,
                updated_at = $12
            WHERE id = $1
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.status)
        .bind(order.payment_state)
        .bind(order.tracking_number.as_deref())
        .bind(order.carrier_name.as_deref())
        .bind(order.cancellation_reason.as_deref())
        .bind(order.timestamps.confirmed_at)
        .bind(order.timestamps.processing_at)
        .bind(order.timestamps.shipped_at)
        .bind(order.timestamps.delivered_at)
        .bind(order.timestamps.cancelled_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(order)
    }

    async fn sum_reserved(
        &self,
        product: ProductId,
        statuses: &[OrderStatus],
    ) -> Result<i64, RepositoryError> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let reserved: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM((item->>'quantity')::BIGINT), 0)::BIGINT
            FROM storefront.order o
            CROSS JOIN LATERAL jsonb_array_elements(o.line_items) AS item
            WHERE (item->>'product_id')::INT = $1
              AND o.status::TEXT = ANY($2)
            ",
        )
        .bind(product)
        .bind(statuses.as_slice())
        .fetch_one(&self.pool)
        .await?;

        Ok(reserved)
    }
}
