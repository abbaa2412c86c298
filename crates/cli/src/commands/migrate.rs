//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! mg-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (fallback: `DATABASE_URL`)
//!
//! # Migration Files
//!
//! ```text
//! crates/storefront/migrations/
//! ├── 20261001000001_create_schema.sql
//! ├── 20261001000002_create_products.sql
//! ├── 20261001000003_create_charge_rules.sql
//! └── 20261001000004_create_orders.sql
//! ```

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn storefront() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
