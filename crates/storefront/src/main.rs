//! Marigold storefront - order submission and fulfillment service.
//!
//! This binary serves the checkout API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework with JSON handlers
//! - `PostgreSQL` for orders, charge rules and stock totals
//! - Shiprocket-style carrier API for shipment creation
//! - Klaviyo events for verification codes and confirmations
//!
//! # Security
//!
//! Payment signatures are checked with a shared HMAC secret. Admin routes
//! require the `ADMIN_API_TOKEN` bearer token.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::Router;
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marigold_storefront::carrier::HttpCarrierClient;
use marigold_storefront::config::{LogFormat, StorefrontConfig};
use marigold_storefront::db::{
    self, ChargeRuleRepository, OrderRepository, ProductRepository,
};
use marigold_storefront::middleware::request_id_middleware;
use marigold_storefront::routes;
use marigold_storefront::services::{KlaviyoNotifier, LogNotifier, Notifier};
use marigold_storefront::state::{AppState, Collaborators, Pipeline};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marigold_storefront=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn notifier(config: &StorefrontConfig) -> Arc<dyn Notifier> {
    let Some(api_key) = config.klaviyo_api_key.as_ref() else {
        tracing::warn!("KLAVIYO_API_KEY not set, notifications will only be logged");
        return Arc::new(LogNotifier);
    };

    match KlaviyoNotifier::new(api_key, config.pipeline.notify_timeout) {
        Ok(klaviyo) => Arc::new(klaviyo),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Klaviyo client, falling back to log notifier");
            Arc::new(LogNotifier)
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p marigold-cli -- migrate

    let carrier = HttpCarrierClient::new(&config.carrier.base_url, config.carrier.timeout)
        .expect("Failed to build carrier client");

    let collaborators = Collaborators {
        orders: Arc::new(OrderRepository::new(pool.clone())),
        stock: Arc::new(ProductRepository::new(pool.clone())),
        charge_rules: Arc::new(ChargeRuleRepository::new(pool.clone())),
        carrier: Arc::new(carrier),
        notifier: notifier(&config),
    };
    let pipeline = Pipeline::new(
        collaborators,
        &config.pipeline,
        config.payment_secret.clone(),
        config.carrier.gateway_settings(),
    );
    let state = AppState::new(config.clone(), pool, pipeline);

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
