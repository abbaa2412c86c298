//! Stock commands.

use tracing::info;

use marigold_core::ProductId;
use marigold_storefront::db::{OrderRepository, ProductRepository, StockStore};
use marigold_storefront::services::InventoryOracle;

/// Set a product's stock total.
///
/// With a name the product is created if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the total is negative, the product is unknown and no
/// name was given, or the database write fails.
pub async fn set(
    product: i32,
    total: i64,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let repo = ProductRepository::new(pool);
    let product = ProductId::new(product);

    match name {
        Some(name) => repo.upsert(product, name, total).await?,
        None => repo.set_total_stock(product, total).await?,
    }

    info!(product_id = %product, total, "Stock total updated");
    Ok(())
}

/// Print a product's stock snapshot.
///
/// # Errors
///
/// Returns an error if the product is unknown or the database cannot be queried.
pub async fn show(product: i32) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let oracle = InventoryOracle::new(
        std::sync::Arc::new(ProductRepository::new(pool.clone())),
        std::sync::Arc::new(OrderRepository::new(pool)),
    );

    let snapshot = oracle.available_stock(ProductId::new(product)).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("product:   {}", snapshot.product_id);
        println!("total:     {}", snapshot.total);
        println!("reserved:  {}", snapshot.reserved);
        println!("available: {}", snapshot.available);
    }

    Ok(())
}
