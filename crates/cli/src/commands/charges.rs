//! Charge rule commands.
//!
//! Rules are read from a YAML list:
//!
//! ```yaml
//! - label: Shipping
//!   kind: fixed
//!   amount: 100
//!   max_cart_value: 2000
//! - label: Gift wrap
//!   kind: fixed
//!   amount: 25
//!   is_active: false
//! ```

use std::path::Path;

use tracing::{error, info};

use marigold_storefront::db::{ChargeRuleRepository, ChargeRuleStore};
use marigold_storefront::models::NewChargeRule;

/// Parse and validate a charge rule file without touching the database.
fn load_rules(content: &str) -> Result<Vec<NewChargeRule>, Box<dyn std::error::Error>> {
    let rules: Vec<NewChargeRule> = serde_yaml::from_str(content)?;

    let errors: Vec<String> = rules
        .iter()
        .filter_map(|rule| {
            rule.validate()
                .err()
                .map(|e| format!("{}: {e}", rule.label))
        })
        .collect();

    if !errors.is_empty() {
        error!("Charge rule validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    Ok(rules)
}

/// Seed charge rules from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a rule is invalid,
/// or a database operation fails.
pub async fn seed(file_path: &str, replace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading charge rules from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let rules = load_rules(&content)?;
    info!(rules = rules.len(), "Configuration validated successfully");

    let pool = super::connect().await?;
    let repo = ChargeRuleRepository::new(pool);

    if replace {
        let existing = repo.list(false).await?;
        for rule in &existing {
            repo.delete(rule.id).await?;
        }
        info!(removed = existing.len(), "Removed existing charge rules");
    }

    for rule in &rules {
        let created = repo.create(rule).await?;
        info!(id = %created.id, label = %created.label, "Created charge rule");
    }

    info!(created = rules.len(), "Charge rules seeded");
    Ok(())
}

/// Print charge rules.
///
/// # Errors
///
/// Returns an error if the database cannot be queried.
pub async fn list(active_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let rules = ChargeRuleRepository::new(pool).list(active_only).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{:<5} {:<24} {:<11} {:>10} {:>10} {:>10} active", "id", "label", "kind", "amount", "min", "max");
        for rule in &rules {
            let bound = |v: Option<rust_decimal::Decimal>| v.map_or_else(|| "-".to_string(), |d| d.to_string());
            println!(
                "{:<5} {:<24} {:<11} {:>10} {:>10} {:>10} {}",
                rule.id,
                rule.label,
                format!("{:?}", rule.kind).to_lowercase(),
                rule.amount,
                bound(rule.min_cart_value),
                bound(rule.max_cart_value),
                rule.is_active,
            );
        }
    }

    Ok(())
}
