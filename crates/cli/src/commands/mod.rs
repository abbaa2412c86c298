//! CLI command implementations.

pub mod charges;
pub mod migrate;
pub mod stock;

use secrecy::SecretString;
use sqlx::PgPool;

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`
/// (fallback: `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")?;

    tracing::info!("Connecting to storefront database...");
    let pool = marigold_storefront::db::create_pool(&database_url).await?;
    Ok(pool)
}
