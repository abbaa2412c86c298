//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::carrier::{CarrierApi, FulfillmentGateway, GatewaySettings};
use crate::config::{PipelineConfig, StorefrontConfig};
use crate::db::{ChargeRuleStore, OrderStore, StockStore};
use crate::services::{
    InventoryOracle, NotificationDispatcher, Notifier, OrderOrchestrator, PricingEngine,
    VerificationGate,
};

/// External collaborators of the order pipeline.
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub stock: Arc<dyn StockStore>,
    pub charge_rules: Arc<dyn ChargeRuleStore>,
    pub carrier: Arc<dyn CarrierApi>,
    pub notifier: Arc<dyn Notifier>,
}

/// The wired order pipeline.
#[derive(Clone)]
pub struct Pipeline {
    pub gate: Arc<VerificationGate>,
    pub orchestrator: Arc<OrderOrchestrator>,
    pub inventory: Arc<InventoryOracle>,
    pub fulfillment: Arc<FulfillmentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub stock: Arc<dyn StockStore>,
}

impl Pipeline {
    /// Wire the pipeline components around `collaborators`.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        settings: &PipelineConfig,
        payment_secret: SecretString,
        gateway: GatewaySettings,
    ) -> Self {
        let Collaborators {
            orders,
            stock,
            charge_rules,
            carrier,
            notifier,
        } = collaborators;

        let notifications = NotificationDispatcher::new(notifier, settings.notify_timeout);
        let gate = Arc::new(VerificationGate::new(
            payment_secret,
            notifications.clone(),
            settings.verification(),
        ));
        let pricing = Arc::new(PricingEngine::new(
            charge_rules,
            settings.pricing_fail_open,
            settings.store_timeout,
        ));
        let fulfillment = Arc::new(FulfillmentGateway::new(carrier, gateway));
        let orchestrator = Arc::new(OrderOrchestrator::new(
            Arc::clone(&gate),
            pricing,
            Arc::clone(&fulfillment),
            Arc::clone(&orders),
            notifications,
            settings.store_timeout,
        ));
        let inventory = Arc::new(InventoryOracle::new(
            Arc::clone(&stock),
            Arc::clone(&orders),
        ));

        Self {
            gate,
            orchestrator,
            inventory,
            fulfillment,
            orders,
            stock,
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    pipeline: Pipeline,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                pipeline,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }
}
